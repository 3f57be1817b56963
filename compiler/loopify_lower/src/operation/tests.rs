use pretty_assertions::assert_eq;

use loopify_ir::{JavaType, LambdaBody};

use super::*;
use crate::function::Callable;
use crate::test_helpers::fn_type;

fn supplier(arena: &mut ExprArena) -> Callable {
    let zero = arena.int(0);
    let lambda = arena.lambda(Vec::new(), LambdaBody::Expr(zero), fn_type("IntSupplier", &[]));
    Callable::create(arena, lambda, 0).unwrap()
}

fn to_list() -> TerminalOp {
    TerminalOp::container(ContainerCollector::ToCollection(ToCollection::to_list(
        JavaType::list_of(&JavaType::string()),
    )))
}

#[test]
fn generate_absorbs_a_following_limit() {
    let mut arena = ExprArena::new();
    let supplier = supplier(&mut arena);
    let count = arena.int(10);
    let source = Operation::Source(SourceOp::Generate {
        supplier: supplier.clone(),
        limit: None,
    });
    let fused = source.combine_with_next(Operation::Intermediate(IntermediateOp::Limit { count }));
    assert_eq!(
        fused,
        Combined::Fused(Operation::Source(SourceOp::Generate {
            supplier,
            limit: Some(count),
        }))
    );
}

#[test]
fn bounded_generate_keeps_a_second_limit() {
    let mut arena = ExprArena::new();
    let supplier = supplier(&mut arena);
    let first = arena.int(10);
    let second = arena.int(5);
    let source = Operation::Source(SourceOp::Generate {
        supplier,
        limit: Some(first),
    });
    let limit = Operation::Intermediate(IntermediateOp::Limit { count: second });
    assert!(matches!(
        source.combine_with_next(limit),
        Combined::Separate(Operation::Source(_), Operation::Intermediate(IntermediateOp::Limit { .. }))
    ));
}

#[test]
fn sorted_folds_into_list_collection() {
    let sorted = Operation::Intermediate(IntermediateOp::Sorted { comparator: None });
    let Combined::Fused(Operation::Terminal(TerminalOp::Sorted { origin, comparator })) =
        sorted.combine_with_next(Operation::Terminal(to_list()))
    else {
        panic!("sorted() before toList() should fuse");
    };
    assert!(matches!(origin, SortOrigin::List(_)));
    assert_eq!(comparator, None);
}

#[test]
fn sorted_folds_into_to_array() {
    let mut arena = ExprArena::new();
    let cmp = arena.name("cmp", JavaType::generic("java.util.Comparator", vec![JavaType::string()]));
    let sorted = Operation::Intermediate(IntermediateOp::Sorted { comparator: Some(cmp) });
    let to_array = Operation::Terminal(TerminalOp::ToArray(ToArray {
        element: JavaType::string(),
        generator: None,
    }));
    assert!(matches!(
        sorted.combine_with_next(to_array),
        Combined::Fused(Operation::Terminal(TerminalOp::Sorted {
            origin: SortOrigin::Array(_),
            comparator: Some(_),
        }))
    ));
}

#[test]
fn sorted_stays_before_other_terminals() {
    let sorted = Operation::Intermediate(IntermediateOp::Sorted { comparator: None });
    let to_set = Operation::Terminal(TerminalOp::container(ContainerCollector::ToCollection(
        ToCollection::to_set(JavaType::set_of(&JavaType::string())),
    )));
    let combined = sorted.clone().combine_with_next(to_set.clone());
    assert_eq!(combined, Combined::Separate(sorted, to_set));
}

#[test]
fn variable_changing_stages() {
    let mut arena = ExprArena::new();
    let supplier = supplier(&mut arena);
    assert!(Operation::Source(SourceOp::Generate { supplier, limit: None }).changes_variable());
    assert!(Operation::Terminal(to_list()).changes_variable());
    assert!(Operation::Intermediate(IntermediateOp::Widening).changes_variable());
    assert!(!Operation::Intermediate(IntermediateOp::Distinct).changes_variable());
    assert!(!Operation::Intermediate(IntermediateOp::Sorted { comparator: None }).changes_variable());
    assert_eq!(Operation::Terminal(to_list()).name(), "terminal");
}

#[test]
fn terminal_must_be_innermost() {
    use crate::slot::SlotTable;
    use crate::test_helpers::Harness;

    let arena = ExprArena::new();
    let err = Harness::new().run(&arena, |mut ctx| {
        let mut table = SlotTable::new();
        let input = table.alloc(JavaType::string());
        let slots = table.register_all(&[input], &mut ctx);
        Operation::Terminal(to_list())
            .wrap(input, SlotId::STUB, "x;\n".to_owned(), &mut ctx, &slots)
            .unwrap_err()
    });
    assert!(!err.is_not_applicable());
}
