use pretty_assertions::assert_eq;

use loopify_ir::{Receiver, Substitution};

use super::*;
use crate::host::NameScope;

fn run<R>(
    arena: &ExprArena,
    host: &NameScope,
    site: &CallSite,
    has_nested_loop: bool,
    f: impl FnOnce(ReplacementContext<'_>) -> R,
) -> R {
    let options = LowerOptions::default();
    let mut names = NameRegistry::new();
    let env = Env {
        arena,
        host,
        site,
        options: &options,
    };
    f(ReplacementContext::new(env, &mut names, has_nested_loop))
}

fn list_of(raw: &str, element: &JavaType) -> JavaType {
    JavaType::generic(raw, vec![element.clone()])
}

#[test]
fn names_skip_keywords_and_taken_names() {
    let arena = ExprArena::new();
    let host = NameScope::with_names(["i"]);
    run(&arena, &host, &CallSite::statement(), false, |mut ctx| {
        assert_eq!(ctx.register_var_name(&["int", "i"]), "i1");
        assert_eq!(ctx.register_var_name(&["i"]), "i2");
        assert_eq!(ctx.register_var_name(&["count", "i"]), "count");
        assert_eq!(ctx.register_var_name(&["count"]), "count1");
        ctx.reserve("sum");
        assert_eq!(ctx.register_var_name(&["sum"]), "sum1");
    });
}

#[test]
fn declarations_are_hoisted_in_order() {
    let arena = ExprArena::new();
    run(&arena, &NameScope::new(), &CallSite::statement(), false, |mut ctx| {
        let first = ctx.declare(&["first"], &JavaType::BOOLEAN, "true");
        let limit = ctx.declare(&["limit"], &JavaType::LONG, "10");
        ctx.add_before_step("list.clear();\n");
        assert_eq!((first.as_str(), limit.as_str()), ("first", "limit"));
        assert_eq!(
            ctx.drain_before(),
            "boolean first = true;\nlong limit = 10;\nlist.clear();\n"
        );
        assert_eq!(ctx.drain_before(), "");
    });
}

#[test]
fn after_steps_run_in_reverse_registration_order() {
    let arena = ExprArena::new();
    run(&arena, &NameScope::new(), &CallSite::statement(), false, |mut ctx| {
        ctx.add_after_step("inner();\n");
        ctx.add_after_step("outer();\n");
        assert_eq!(ctx.drain_after(), "outer();\ninner();\n");
    });
}

#[test]
fn result_takes_over_a_compatible_initializer() {
    let arena = ExprArena::new();
    let string = JavaType::string();
    let site = CallSite::initializer("result", list_of("java.util.List", &string), false);
    let host = NameScope::with_names(["result"]);
    let replacement = run(&arena, &host, &site, false, |mut ctx| {
        let name = ctx
            .declare_result(
                "list",
                &list_of("java.util.ArrayList", &string),
                Some("java.util.Collection"),
                "new java.util.ArrayList<>()",
                ResultKind::Final,
            )
            .unwrap();
        assert_eq!(name, "result");
        assert_eq!(
            ctx.drain_before(),
            "java.util.List<String> result = new java.util.ArrayList<>();\n"
        );
        // a second result never takes the same declaration
        let second = ctx
            .declare_result("count", &JavaType::LONG, None, "0L", ResultKind::Unknown)
            .unwrap();
        assert_eq!(second, "count");
        ctx.finish()
    })
    .unwrap();
    assert_eq!(replacement.disposition, Disposition::DeleteStatement);
    assert_eq!(replacement.finisher, None);
}

#[test]
fn final_site_rejects_a_reassigned_result() {
    let arena = ExprArena::new();
    let site = CallSite::initializer("count", JavaType::LONG, true);
    let host = NameScope::with_names(["count"]);
    let replacement = run(&arena, &host, &site, false, |mut ctx| {
        let name = ctx
            .declare_result("count", &JavaType::LONG, None, "0L", ResultKind::NonFinal)
            .unwrap();
        assert_eq!(name, "count1");
        assert_eq!(ctx.drain_before(), "long count1 = 0L;\n");
        ctx.finish()
    })
    .unwrap();
    assert_eq!(replacement.disposition, Disposition::Replace(ReplaceTarget::Pipeline));
    assert_eq!(replacement.finisher.as_deref(), Some("count1"));
}

#[test]
fn incompatible_site_type_keeps_a_separate_result() {
    let arena = ExprArena::new();
    let string = JavaType::string();
    let site = CallSite::initializer("names", list_of("java.util.LinkedList", &string), false);
    run(&arena, &NameScope::new(), &site, false, |mut ctx| {
        let name = ctx
            .declare_result(
                "list",
                &list_of("java.util.ArrayList", &string),
                Some("java.util.Collection"),
                "new java.util.ArrayList<>()",
                ResultKind::Final,
            )
            .unwrap();
        assert_eq!(name, "list");
    });
}

#[test]
fn compatibility_respects_the_most_abstract_use() {
    let string = JavaType::string();
    let array_list = list_of("java.util.ArrayList", &string);
    assert!(is_compatible(&array_list, &array_list, None));
    assert!(is_compatible(
        &list_of("java.util.Collection", &string),
        &array_list,
        Some("java.util.Collection")
    ));
    // the accumulator needs at least a List
    assert!(!is_compatible(
        &list_of("java.util.Collection", &string),
        &array_list,
        Some("java.util.List")
    ));
    assert!(!is_compatible(
        &list_of("java.util.List", &JavaType::object()),
        &array_list,
        Some("java.util.Collection")
    ));
    let tree_map = JavaType::generic("java.util.TreeMap", vec![string.clone(), string.clone()]);
    let map = JavaType::generic("java.util.Map", vec![string.clone(), string]);
    assert!(is_compatible(&map, &tree_map, Some("java.util.Map")));
}

#[test]
fn finisher_is_set_once() {
    let arena = ExprArena::new();
    run(&arena, &NameScope::new(), &CallSite::expression(), false, |mut ctx| {
        ctx.set_finisher("a").unwrap();
        let err = ctx.set_finisher("b").unwrap_err();
        assert!(err.to_string().contains("finisher already set to `a`"));
    });
}

#[test]
fn used_result_without_finisher_is_an_error() {
    let arena = ExprArena::new();
    let result = run(&arena, &NameScope::new(), &CallSite::expression(), false, |mut ctx| {
        ctx.declare(&["x"], &JavaType::INT, "0");
        ctx.finish()
    });
    assert!(result.is_err());
}

#[test]
fn statement_site_deletes_the_statement() {
    let arena = ExprArena::new();
    let replacement = run(&arena, &NameScope::new(), &CallSite::statement(), false, |mut ctx| {
        ctx.set_finisher("ignored").unwrap();
        ctx.finish()
    })
    .unwrap();
    assert_eq!(replacement.disposition, Disposition::DeleteStatement);
}

#[test]
fn break_is_labelled_only_with_nested_loops() {
    let arena = ExprArena::new();
    run(&arena, &NameScope::new(), &CallSite::statement(), false, |mut ctx| {
        assert_eq!(ctx.break_statement(), "break;\n");
        assert_eq!(ctx.label_prefix(), "");
    });
    let mut host = NameScope::new();
    host.add_label("outer");
    run(&arena, &host, &CallSite::statement(), true, |mut ctx| {
        assert_eq!(ctx.break_statement(), "break outer1;\n");
        assert_eq!(ctx.break_statement(), "break outer1;\n");
        assert_eq!(ctx.label_prefix(), "outer1:\n");
    });
}

#[test]
fn nested_contexts_rename_the_parameter_and_share_names() {
    let mut arena = ExprArena::new();
    let x = arena.name("x", JavaType::INT);
    run(&arena, &NameScope::new(), &CallSite::statement(), true, |mut ctx| {
        assert_eq!(ctx.register_var_name(&["i"]), "i");
        {
            let mut inner = ctx.nested(Some("x"), Operand::primary("item"), true);
            assert_eq!(inner.render(x).text, "item");
            assert_eq!(inner.register_var_name(&["i"]), "i1");
            assert_eq!(inner.break_statement(), "break inner;\n");
            assert_eq!(inner.label_prefix(), "inner:\n");
        }
        assert_eq!(ctx.render(x).text, "x");
        assert_eq!(ctx.loop_label(), "outer");
    });
}

#[test]
fn find_in_return_returns_directly() {
    let arena = ExprArena::new();
    let replacement = run(&arena, &NameScope::new(), &CallSite::returned(), false, |mut ctx| {
        let exit = ctx
            .assign_and_break(ConditionalExpression::Optional {
                ty: JavaType::string(),
                condition: "found".into(),
                present: "s".into(),
            })
            .unwrap();
        assert_eq!(exit, "return java.util.Optional.of(s);\n");
        assert_eq!(ctx.drain_before(), "");
        ctx.finish()
    })
    .unwrap();
    assert_eq!(
        replacement.finisher.as_deref(),
        Some("java.util.Optional.empty()")
    );
}

#[test]
fn is_present_use_folds_into_a_flag() {
    let arena = ExprArena::new();
    let site = CallSite::expression().with_use(ResultUse::IsPresent);
    let replacement = run(&arena, &NameScope::new(), &site, false, |mut ctx| {
        let exit = ctx
            .assign_and_break(ConditionalExpression::Optional {
                ty: JavaType::string(),
                condition: "found".into(),
                present: "s".into(),
            })
            .unwrap();
        assert_eq!(exit, "found = true;\nbreak;\n");
        assert_eq!(ctx.drain_before(), "boolean found = false;\n");
        ctx.finish()
    })
    .unwrap();
    assert_eq!(replacement.disposition, Disposition::Replace(ReplaceTarget::ResultUse));
    assert_eq!(replacement.finisher.as_deref(), Some("found"));
}

#[test]
fn or_else_folds_into_a_ternary() {
    let mut arena = ExprArena::new();
    let fallback = arena.int(-1);
    let site = CallSite::expression().with_use(ResultUse::OrElse(fallback));
    let replacement = run(&arena, &NameScope::new(), &site, false, |mut ctx| {
        ctx.set_conditional_finisher(ConditionalExpression::Optional {
            ty: JavaType::INT,
            condition: "seen".into(),
            present: "best".into(),
        })
        .unwrap();
        ctx.finish()
    })
    .unwrap();
    assert_eq!(replacement.finisher.as_deref(), Some("seen ? best : -1"));
    assert_eq!(replacement.disposition, Disposition::Replace(ReplaceTarget::ResultUse));
}

#[test]
fn or_else_with_limit_constant_is_recognized() {
    let mut arena = ExprArena::new();
    let min = arena.field(Receiver::Type("Integer".into()), "MIN_VALUE", JavaType::INT);
    let site = CallSite::expression().with_use(ResultUse::OrElse(min));
    run(&arena, &NameScope::new(), &site, false, |mut ctx| {
        assert!(!ctx.try_unwrap_or_else(i64::from(i32::MAX)));
        assert!(ctx.try_unwrap_or_else(i64::from(i32::MIN)));
        // folded once; later conditionals keep their shape
        assert!(!ctx.try_unwrap_or_else(i64::from(i32::MIN)));
    });
}

#[test]
fn renames_start_empty() {
    let arena = ExprArena::new();
    run(&arena, &NameScope::new(), &CallSite::statement(), false, |ctx| {
        assert_eq!(ctx.renames(), &Substitution::default());
        assert!(!ctx.has_nested_loop());
    });
}
