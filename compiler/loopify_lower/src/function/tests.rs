use pretty_assertions::assert_eq;

use loopify_ir::{BinaryOp, Receiver};

use super::*;
use crate::host::NameScope;
use crate::test_helpers::{fn_type, Harness};

fn run<R>(arena: &ExprArena, f: impl FnOnce(ReplacementContext<'_>) -> R) -> R {
    Harness::new().run(arena, f)
}

fn print_stream() -> JavaType {
    JavaType::class("java.io.PrintStream")
}

/// `System.out.println(arg)`
fn println(arena: &mut ExprArena, arg: ExprId) -> ExprId {
    let out = arena.field(Receiver::Type("System".into()), "out", print_stream());
    arena.method(out, "println", vec![arg], JavaType::Void)
}

fn bind(arena: &ExprArena, callable: Callable, args: &[Operand]) -> BoundCallable {
    run(arena, |mut ctx| callable.transform(&mut ctx, args).unwrap())
}

#[test]
fn lambda_body_is_printed_with_arguments_substituted() {
    let mut arena = ExprArena::new();
    let x = arena.name("x", JavaType::INT);
    let two = arena.int(2);
    let body = arena.binary(BinaryOp::Mul, x, two, JavaType::INT);
    let lambda = arena.lambda(
        vec![("x", JavaType::INT)],
        LambdaBody::Expr(body),
        fn_type("IntUnaryOperator", &[]),
    );
    let callable = Callable::create(&arena, lambda, 1).unwrap();
    assert_eq!(callable.inlined_lambda(), Some(lambda));
    assert_eq!(callable.param_name(&arena, 0), Some("x"));
    assert_eq!(callable.result_type(&arena), Some(JavaType::INT));

    let bound = bind(&arena, callable, &[Operand::new("a + b", Precedence::Additive)]);
    assert_eq!(bound.text(), "(a + b) * 2");
    assert_eq!(bound.statement(), "(a + b) * 2;\n");
}

#[test]
fn arity_mismatch_is_rejected_up_front() {
    let mut arena = ExprArena::new();
    let x = arena.name("x", JavaType::INT);
    let lambda = arena.lambda(
        vec![("x", JavaType::INT)],
        LambdaBody::Expr(x),
        fn_type("IntUnaryOperator", &[]),
    );
    assert_eq!(Callable::create(&arena, lambda, 2), None);
    let count = arena.name("count", JavaType::INT);
    assert_eq!(Callable::create(&arena, count, 1), None);
    let nothing = arena.null();
    assert_eq!(Callable::create(&arena, nothing, 1), None);
}

#[test]
fn predicates_negate_structurally() {
    let mut arena = ExprArena::new();
    let x = arena.name("x", JavaType::INT);
    let zero = arena.int(0);
    let body = arena.binary(BinaryOp::Gt, x, zero, JavaType::BOOLEAN);
    let lambda = arena.lambda(
        vec![("x", JavaType::INT)],
        LambdaBody::Expr(body),
        fn_type("IntPredicate", &[]),
    );
    let callable = Callable::create(&arena, lambda, 1).unwrap();
    let bound = bind(&arena, callable, &[Operand::primary("v")]);
    assert_eq!(bound.text(), "v > 0");
    assert_eq!(bound.negated().text, "v <= 0");
}

#[test]
fn method_references_become_calls() {
    let mut arena = ExprArena::new();
    let integer = JavaType::class("Integer");
    let sum = arena.method_ref(
        MethodRefKind::Static("Integer".into()),
        "sum",
        JavaType::INT,
        fn_type("BinaryOperator", &[integer]),
    );
    let length = arena.method_ref(
        MethodRefKind::Unbound("String".into()),
        "length",
        JavaType::INT,
        fn_type("ToIntFunction", &[JavaType::string()]),
    );
    let array_list = JavaType::generic("java.util.ArrayList", vec![JavaType::string()]);
    let new_list = arena.method_ref(
        MethodRefKind::Constructor(JavaType::class("java.util.ArrayList")),
        "new",
        array_list.clone(),
        fn_type("Supplier", &[array_list]),
    );
    let new_array = arena.method_ref(
        MethodRefKind::ArrayConstructor(JavaType::string()),
        "new",
        JavaType::array(JavaType::string()),
        fn_type("IntFunction", &[JavaType::array(JavaType::string())]),
    );

    let sum = Callable::create(&arena, sum, 2).unwrap();
    let bound = bind(&arena, sum, &[Operand::primary("acc"), Operand::primary("x")]);
    assert_eq!(bound.text(), "Integer.sum(acc, x)");

    let length = Callable::create(&arena, length, 1).unwrap();
    assert_eq!(length.inlined_lambda(), None);
    let bound = bind(&arena, length, &[Operand::new("a + b", Precedence::Additive)]);
    assert_eq!(bound.text(), "(a + b).length()");

    let new_list = Callable::create(&arena, new_list, 0).unwrap();
    assert_eq!(bind(&arena, new_list, &[]).text(), "new java.util.ArrayList<>()");

    let new_array = Callable::create(&arena, new_array, 1).unwrap();
    assert_eq!(bind(&arena, new_array, &[Operand::primary("n")]).text(), "new String[n]");
}

#[test]
fn bound_qualifier_with_effects_is_evaluated_once() {
    let mut arena = ExprArena::new();
    let out = arena.field(Receiver::Type("System".into()), "out", print_stream());
    let pure = arena.method_ref(
        MethodRefKind::Bound(out),
        "println",
        JavaType::Void,
        fn_type("Consumer", &[JavaType::string()]),
    );
    let pure = Callable::create(&arena, pure, 1).unwrap();
    assert_eq!(bind(&arena, pure, &[Operand::primary("s")]).text(), "System.out.println(s)");

    let get_out = arena.alloc(
        ExprKind::Call {
            receiver: Receiver::None,
            method: "getOut".into(),
            args: Vec::new(),
        },
        print_stream(),
    );
    let effectful = arena.method_ref(
        MethodRefKind::Bound(get_out),
        "println",
        JavaType::Void,
        fn_type("Consumer", &[JavaType::string()]),
    );
    let effectful = Callable::create(&arena, effectful, 1).unwrap();
    run(&arena, |mut ctx| {
        let bound = effectful.transform(&mut ctx, &[Operand::primary("s")]).unwrap();
        assert_eq!(bound.text(), "out.println(s)");
        assert_eq!(ctx.drain_before(), "java.io.PrintStream out = getOut();\n");
    });
}

#[test]
fn templates_wrap_loose_arguments() {
    let arena = ExprArena::new();
    let non_null = Callable::template_with("{0} != null", JavaType::BOOLEAN, Precedence::Equality);
    let bound = bind(&arena, non_null, &[Operand::new("a + b", Precedence::Additive)]);
    assert_eq!(bound.text(), "(a + b) != null");
    assert_eq!(bound.negated().text, "!((a + b) != null)");

    let identity = Callable::identity(Some(JavaType::string()));
    let bound = bind(&arena, identity, &[Operand::new("a + b", Precedence::Additive)]);
    assert_eq!(bound.operand(), &Operand::new("a + b", Precedence::Additive));

    let supplier = Callable::object_supplier("java.util.HashSet", JavaType::set_of(&JavaType::string()));
    assert_eq!(bind(&arena, supplier, &[]).text(), "new java.util.HashSet<>()");
}

#[test]
fn function_identity_is_inlined() {
    let mut arena = ExprArena::new();
    let identity = arena.static_call(
        "Function",
        "identity",
        Vec::new(),
        fn_type("Function", &[JavaType::string(), JavaType::string()]),
    );
    let callable = Callable::create(&arena, identity, 1).unwrap();
    assert_eq!(callable, Callable::identity(Some(JavaType::string())));
}

#[test]
fn functional_variables_call_their_method() {
    let mut arena = ExprArena::new();
    let predicate_ty = fn_type("Predicate", &[JavaType::string()]);
    let p = arena.name("p", predicate_ty.clone());
    let callable = Callable::create(&arena, p, 1).unwrap();
    assert_eq!(callable.result_type(&arena), Some(JavaType::BOOLEAN));
    assert_eq!(bind(&arena, callable, &[Operand::primary("s")]).text(), "p.test(s)");

    let make = arena.alloc(
        ExprKind::Call {
            receiver: Receiver::None,
            method: "makePredicate".into(),
            args: Vec::new(),
        },
        predicate_ty,
    );
    let callable = Callable::create(&arena, make, 1).unwrap();
    run(&arena, |mut ctx| {
        let bound = callable.transform(&mut ctx, &[Operand::primary("s")]).unwrap();
        assert_eq!(bound.text(), "predicate.test(s)");
        assert_eq!(
            ctx.drain_before(),
            "java.util.function.Predicate<String> predicate = makePredicate();\n"
        );
    });
}

#[test]
fn single_abstract_method_names() {
    assert_eq!(sam_name(&fn_type("ToIntFunction", &[JavaType::string()])), "applyAsInt");
    assert_eq!(sam_name(&fn_type("IntBinaryOperator", &[])), "applyAsInt");
    assert_eq!(sam_name(&fn_type("LongSupplier", &[])), "getAsLong");
    assert_eq!(sam_name(&fn_type("BiConsumer", &[])), "accept");
    assert_eq!(sam_name(&fn_type("IntPredicate", &[])), "test");
    assert_eq!(sam_name(&JavaType::generic("java.util.Comparator", vec![])), "compare");
    assert_eq!(sam_name(&fn_type("BiFunction", &[])), "apply");
}

#[test]
fn functional_result_types() {
    let string = JavaType::string();
    let integer = JavaType::class("Integer");
    assert_eq!(
        functional_result(&fn_type("Function", &[string.clone(), integer.clone()])),
        Some(integer)
    );
    assert_eq!(
        functional_result(&fn_type("ToDoubleFunction", &[string.clone()])),
        Some(JavaType::DOUBLE)
    );
    assert_eq!(functional_result(&fn_type("Consumer", &[string])), Some(JavaType::Void));
    assert_eq!(functional_result(&fn_type("IntSupplier", &[])), Some(JavaType::INT));
}

#[test]
fn block_consumer_with_return_inlines_only_at_loop_tail() {
    let mut arena = ExprArena::new();
    let x = arena.name("x", JavaType::string());
    let null = arena.null();
    let is_null = arena.binary(BinaryOp::Eq, x, null, JavaType::BOOLEAN);
    let print = println(&mut arena, x);
    let body = LambdaBody::Block(vec![
        Stmt::If {
            cond: is_null,
            then_branch: vec![Stmt::Return(None)],
            else_branch: Vec::new(),
        },
        Stmt::Expr(print),
    ]);
    let lambda = arena.lambda(
        vec![("x", JavaType::string())],
        body,
        fn_type("Consumer", &[JavaType::string()]),
    );

    assert!(matches!(
        Callable::create(&arena, lambda, 1),
        Some(Callable::Complex { sam: "accept", .. })
    ));
    let tail = Callable::create_terminal_consumer(&arena, lambda).unwrap();
    assert_eq!(tail.result_type(&arena), Some(JavaType::Void));
    let bound = bind(&arena, tail, &[Operand::primary("s")]);
    assert_eq!(
        bound.statement(),
        "if (s == null) {\ncontinue;\n}\nSystem.out.println(s);\n"
    );
}

#[test]
fn output_names_come_from_the_mapped_expression() {
    let mut arena = ExprArena::new();
    let user = JavaType::class("User");
    let u = arena.name("u", user.clone());
    let get_name = arena.method(u, "getName", Vec::new(), JavaType::string());
    let mapper = arena.lambda(
        vec![("u", user.clone())],
        LambdaBody::Expr(get_name),
        fn_type("Function", &[user.clone(), JavaType::string()]),
    );
    let host = NameScope::new();
    let mut slot = UnboundSlot::new(JavaType::string());
    Callable::create(&arena, mapper, 1)
        .unwrap()
        .suggest_output_names(&arena, &host, &mut slot);
    let mut named = UnboundSlot::new(JavaType::string());
    named.add_other_candidate("name");
    named.add_other_candidate("getName");
    assert_eq!(slot, named);

    let identity = arena.lambda(
        vec![("u", user.clone())],
        LambdaBody::Expr(u),
        fn_type("UnaryOperator", &[user]),
    );
    let mut slot = UnboundSlot::new(JavaType::string());
    Callable::create(&arena, identity, 1)
        .unwrap()
        .suggest_output_names(&arena, &host, &mut slot);
    assert_eq!(slot, UnboundSlot::new(JavaType::string()));
}

#[test]
fn final_name_prefers_desired_then_result_type() {
    let mut arena = ExprArena::new();
    let host = NameScope::new();
    let set = JavaType::generic("java.util.TreeSet", vec![JavaType::string()]);
    let new_set = arena.method_ref(
        MethodRefKind::Constructor(JavaType::class("java.util.TreeSet")),
        "new",
        set.clone(),
        fn_type("Supplier", &[set]),
    );
    let supplier = Callable::create(&arena, new_set, 0).unwrap();
    assert_eq!(supplier.suggest_final_name(&arena, &host, Some("list"), "acc"), "list");
    assert_eq!(supplier.suggest_final_name(&arena, &host, None, "acc"), "strings");

    let opaque = Callable::Complex {
        expr: new_set,
        sam: "get",
        result_type: None,
    };
    assert_eq!(opaque.suggest_final_name(&arena, &host, None, "acc"), "acc");
}
