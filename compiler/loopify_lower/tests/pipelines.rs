// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end lowering through the public API.
//!
//! Each test builds a resolved call chain the way a host front end would,
//! lowers it at a call site and checks the statements handed back.

mod common;

use loopify_ir::{BinaryOp, ExprArena, ExprId, JavaType, LambdaBody, MethodRefKind, Stmt};
use loopify_lower::{apply, format_block, CallSite, Disposition, Lowered, ReplaceTarget, Synthesizer};
use pretty_assertions::assert_eq;

use common::{collector, fn_type, integer, lambda, lower_with, stage};

#[test]
fn collected_list_replaces_the_declaration() {
    let mut arena = ExprArena::new();
    let list = arena.name("list", JavaType::list_of(&integer()));
    let stream = stage(&mut arena, list, "stream", Vec::new(), &integer());
    let even = lambda(&mut arena, "x", integer(), fn_type("Predicate", &[integer()]), |arena, x| {
        let two = arena.int(2);
        let rem = arena.binary(BinaryOp::Rem, x, two, JavaType::INT);
        let zero = arena.int(0);
        arena.binary(BinaryOp::Eq, rem, zero, JavaType::BOOLEAN)
    });
    let filtered = stage(&mut arena, stream, "filter", vec![even], &integer());
    let square = lambda(&mut arena, "x", integer(), fn_type("Function", &[integer(), integer()]), |arena, x| {
        let again = arena.name("x", integer());
        arena.binary(BinaryOp::Mul, x, again, JavaType::INT)
    });
    let mapped = stage(&mut arena, filtered, "map", vec![square], &integer());
    let result = JavaType::list_of(&integer());
    let to_list = collector(&mut arena, "toList", Vec::new(), &integer(), result.clone());
    let terminal = arena.method(mapped, "collect", vec![to_list], result.clone());

    let site = CallSite::initializer("result", result, false);
    let lowered = lower_with(&mut arena, terminal, &["list", "result"], &site).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
java.util.List<Integer> result = new java.util.ArrayList<>();
for (Integer x : list) {
    if (x % 2 == 0) {
        Integer integer = x * x;
        result.add(integer);
    }
}
"
    );
    assert_eq!(lowered.disposition, Disposition::DeleteStatement);
}

#[test]
fn counted_range_breaks_on_the_first_match() {
    let mut arena = ExprArena::new();
    let zero = arena.int(0);
    let n = arena.name("n", JavaType::INT);
    let range = arena.static_call("IntStream", "range", vec![zero, n], JavaType::stream_of(&JavaType::INT));
    let divisible = lambda(&mut arena, "i", JavaType::INT, fn_type("IntPredicate", &[]), |arena, i| {
        let three = arena.int(3);
        let rem = arena.binary(BinaryOp::Rem, i, three, JavaType::INT);
        let zero = arena.int(0);
        arena.binary(BinaryOp::Eq, rem, zero, JavaType::BOOLEAN)
    });
    let terminal = arena.method(range, "anyMatch", vec![divisible], JavaType::BOOLEAN);

    let lowered = lower_with(&mut arena, terminal, &["n"], &CallSite::expression()).unwrap();
    assert_eq!(lowered.before, "boolean b = false;\n");
    assert_eq!(
        lowered.loop_nest,
        "for (int i = 0; i < n; i++) {\nif (i % 3 == 0) {\nb = true;\nbreak;\n}\n}\n"
    );
    assert_eq!(lowered.finisher.as_deref(), Some("b"));
    assert_eq!(lowered.target(), Some(ReplaceTarget::Pipeline));
}

#[test]
fn flat_map_breaks_out_of_both_loops() {
    let mut arena = ExprArena::new();
    let row = JavaType::list_of(&integer());
    let rows = arena.name("rows", JavaType::list_of(&row));
    let stream = stage(&mut arena, rows, "stream", Vec::new(), &row);
    let to_stream = lambda(
        &mut arena,
        "r",
        row.clone(),
        fn_type("Function", &[row.clone(), JavaType::stream_of(&integer())]),
        |arena, r| stage(arena, r, "stream", Vec::new(), &integer()),
    );
    let flat = stage(&mut arena, stream, "flatMap", vec![to_stream], &integer());
    let positive = lambda(&mut arena, "v", integer(), fn_type("Predicate", &[integer()]), |arena, v| {
        let zero = arena.int(0);
        arena.binary(BinaryOp::Gt, v, zero, JavaType::BOOLEAN)
    });
    let terminal = arena.method(flat, "anyMatch", vec![positive], JavaType::BOOLEAN);

    let lowered = lower_with(&mut arena, terminal, &["rows"], &CallSite::expression()).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
boolean b = false;
outer:
for (java.util.List<Integer> r : rows) {
    for (Integer v : r) {
        if (v > 0) {
            b = true;
            break outer;
        }
    }
}
"
    );
}

#[test]
fn limited_iteration_counts_down_a_hoisted_limit() {
    let mut arena = ExprArena::new();
    // Stream.iterate(1, x -> x * 2).limit(10).forEach(sink)
    let seed = arena.int(1);
    let double = lambda(&mut arena, "x", integer(), fn_type("UnaryOperator", &[integer()]), |arena, x| {
        let two = arena.int(2);
        arena.binary(BinaryOp::Mul, x, two, JavaType::INT)
    });
    let iterate = arena.static_call("Stream", "iterate", vec![seed, double], JavaType::stream_of(&integer()));
    let ten = arena.int(10);
    let limited = stage(&mut arena, iterate, "limit", vec![ten], &integer());
    let sink = arena.name("sink", fn_type("Consumer", &[integer()]));
    let terminal = arena.method(limited, "forEach", vec![sink], JavaType::Void);

    let lowered = lower_with(&mut arena, terminal, &["sink"], &CallSite::statement()).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
long limit = 10;
for (Integer x = 1; ; x = x * 2) {
    if (limit-- == 0) {
        break;
    }
    sink.accept(x);
}
"
    );
    assert_eq!(lowered.disposition, Disposition::DeleteStatement);
}

#[test]
fn reduce_over_an_empty_source_yields_the_identity() {
    let mut arena = ExprArena::new();
    // Stream.empty().reduce(0, Integer::sum)
    let empty = arena.static_call("Stream", "empty", Vec::new(), JavaType::stream_of(&integer()));
    let zero = arena.int(0);
    let sum = arena.method_ref(
        MethodRefKind::Static("Integer".into()),
        "sum",
        JavaType::INT,
        fn_type("BinaryOperator", &[integer()]),
    );
    let terminal = arena.method(empty, "reduce", vec![zero, sum], integer());

    let lowered = lower_with(&mut arena, terminal, &[], &CallSite::expression()).unwrap();
    assert_eq!(lowered.before, "Integer acc = 0;\n");
    assert_eq!(
        lowered.loop_nest,
        "for (Integer integer : new Integer[]{}) {\nacc = Integer.sum(acc, integer);\n}\n"
    );
    assert_eq!(lowered.finisher.as_deref(), Some("acc"));
    assert_eq!(lowered.target(), Some(ReplaceTarget::Pipeline));
}

#[test]
fn conditional_flat_map_guards_the_inner_loop() {
    let mut arena = ExprArena::new();
    // values.stream().flatMap(x -> x < 0 ? Stream.empty() : Stream.of(x, x + 1)).forEach(sink)
    let values = arena.name("values", JavaType::list_of(&integer()));
    let stream = stage(&mut arena, values, "stream", Vec::new(), &integer());
    let expand = lambda(
        &mut arena,
        "x",
        integer(),
        fn_type("Function", &[integer(), JavaType::stream_of(&integer())]),
        |arena, x| {
            let zero = arena.int(0);
            let negative = arena.binary(BinaryOp::Lt, x, zero, JavaType::BOOLEAN);
            let empty = arena.static_call("Stream", "empty", Vec::new(), JavaType::stream_of(&integer()));
            let same = arena.name("x", integer());
            let next = arena.name("x", integer());
            let one = arena.int(1);
            let successor = arena.binary(BinaryOp::Add, next, one, JavaType::INT);
            let pair = arena.static_call("Stream", "of", vec![same, successor], JavaType::stream_of(&integer()));
            arena.ternary(negative, empty, pair)
        },
    );
    let flat = stage(&mut arena, stream, "flatMap", vec![expand], &integer());
    let sink = arena.name("sink", fn_type("Consumer", &[integer()]));
    let terminal = arena.method(flat, "forEach", vec![sink], JavaType::Void);

    let lowered = lower_with(&mut arena, terminal, &["values", "sink"], &CallSite::statement()).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
for (Integer x : values) {
    if (x >= 0) {
        for (Integer integer : new Integer[]{x, x + 1}) {
            sink.accept(integer);
        }
    }
}
"
    );
}

#[test]
fn grouped_counts_merge_into_the_map() {
    let mut arena = ExprArena::new();
    // Map<Integer, Long> lengths = words.stream().collect(groupingBy(String::length, counting()))
    let string = JavaType::string();
    let words = arena.name("words", JavaType::list_of(&string));
    let stream = stage(&mut arena, words, "stream", Vec::new(), &string);
    let length = arena.method_ref(
        MethodRefKind::Unbound("String".into()),
        "length",
        JavaType::INT,
        fn_type("Function", &[string.clone(), integer()]),
    );
    let counting = collector(&mut arena, "counting", Vec::new(), &string, JavaType::class("Long"));
    let result = JavaType::generic("java.util.Map", vec![integer(), JavaType::class("Long")]);
    let grouping = collector(&mut arena, "groupingBy", vec![length, counting], &string, result.clone());
    let terminal = arena.method(stream, "collect", vec![grouping], result.clone());

    let site = CallSite::initializer("lengths", result, false);
    let lowered = lower_with(&mut arena, terminal, &["words", "lengths"], &site).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
java.util.Map<Integer, Long> lengths = new java.util.HashMap<>();
for (String word : words) {
    lengths.merge(word.length(), 1L, Long::sum);
}
"
    );
    assert_eq!(lowered.disposition, Disposition::DeleteStatement);
}

#[test]
fn limit_after_flat_map_breaks_the_labelled_loop() {
    let mut arena = ExprArena::new();
    // rows.stream().flatMap(r -> r.stream()).limit(5).forEach(sink)
    let row = JavaType::list_of(&integer());
    let rows = arena.name("rows", JavaType::list_of(&row));
    let stream = stage(&mut arena, rows, "stream", Vec::new(), &row);
    let to_stream = lambda(
        &mut arena,
        "r",
        row.clone(),
        fn_type("Function", &[row.clone(), JavaType::stream_of(&integer())]),
        |arena, r| stage(arena, r, "stream", Vec::new(), &integer()),
    );
    let flat = stage(&mut arena, stream, "flatMap", vec![to_stream], &integer());
    let five = arena.int(5);
    let limited = stage(&mut arena, flat, "limit", vec![five], &integer());
    let sink = arena.name("sink", fn_type("Consumer", &[integer()]));
    let terminal = arena.method(limited, "forEach", vec![sink], JavaType::Void);

    let lowered = lower_with(&mut arena, terminal, &["rows", "sink"], &CallSite::statement()).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
long limit = 5;
outer:
for (java.util.List<Integer> r : rows) {
    for (Integer integer : r) {
        if (limit-- == 0) {
            break outer;
        }
        sink.accept(integer);
    }
}
"
    );
}

/// `x -> { int t = x; out.println(t); }`
fn printing_block(arena: &mut ExprArena) -> ExprId {
    let x = arena.name("x", integer());
    let out = arena.name("out", JavaType::class("java.io.PrintStream"));
    let t = arena.name("t", JavaType::INT);
    let print = arena.method(out, "println", vec![t], JavaType::Void);
    let body = LambdaBody::Block(vec![
        Stmt::Local {
            ty: JavaType::INT,
            name: "t".to_owned(),
            init: Some(x),
        },
        Stmt::Expr(print),
    ]);
    arena.lambda(vec![("x", integer())], body, fn_type("Consumer", &[integer()]))
}

#[test]
fn block_locals_of_two_lambdas_do_not_collide() {
    let mut arena = ExprArena::new();
    // list.stream().peek(x -> { int t = x; out.println(t); }).forEach(x -> { int t = x; out.println(t); })
    let list = arena.name("list", JavaType::list_of(&integer()));
    let stream = stage(&mut arena, list, "stream", Vec::new(), &integer());
    let peek_action = printing_block(&mut arena);
    let peeked = stage(&mut arena, stream, "peek", vec![peek_action], &integer());
    let for_each_action = printing_block(&mut arena);
    let terminal = arena.method(peeked, "forEach", vec![for_each_action], JavaType::Void);

    let lowered = lower_with(&mut arena, terminal, &["list", "out"], &CallSite::statement()).unwrap();
    assert_eq!(
        format_block(&lowered.block()),
        "\
for (Integer x : list) {
    int t1 = x;
    out.println(t1);
    int t = x;
    out.println(t);
}
"
    );
}

#[test]
fn count_reuses_a_mutable_declaration() {
    let mut arena = ExprArena::new();
    let words = arena.name("words", JavaType::list_of(&JavaType::string()));
    let stream = stage(&mut arena, words, "stream", Vec::new(), &JavaType::string());
    let long_word = lambda(
        &mut arena,
        "w",
        JavaType::string(),
        fn_type("Predicate", &[JavaType::string()]),
        |arena, w| {
            let length = arena.method(w, "length", Vec::new(), JavaType::INT);
            let three = arena.int(3);
            arena.binary(BinaryOp::Gt, length, three, JavaType::BOOLEAN)
        },
    );
    let filtered = stage(&mut arena, stream, "filter", vec![long_word], &JavaType::string());
    let terminal = arena.method(filtered, "count", Vec::new(), JavaType::LONG);

    let site = CallSite::initializer("n", JavaType::LONG, false);
    let lowered = lower_with(&mut arena, terminal, &["words", "n"], &site).unwrap();
    assert_eq!(lowered.before, "long n = 0L;\n");
    assert_eq!(
        lowered.loop_nest,
        "for (String w : words) {\nif (w.length() > 3) {\nn++;\n}\n}\n"
    );
    assert_eq!(lowered.disposition, Disposition::DeleteStatement);

    // a final local cannot be incremented
    let site = CallSite::initializer("n", JavaType::LONG, true);
    let lowered = lower_with(&mut arena, terminal, &["words", "n"], &site).unwrap();
    assert_eq!(lowered.before, "long count = 0L;\n");
    assert_eq!(lowered.finisher.as_deref(), Some("count"));
}

#[test]
fn unsupported_terminals_leave_the_call_alone() {
    let mut arena = ExprArena::new();
    let list = arena.name("list", JavaType::list_of(&integer()));
    let stream = stage(&mut arena, list, "stream", Vec::new(), &integer());
    let iterator = arena.method(stream, "iterator", Vec::new(), JavaType::class("java.util.Iterator"));
    let err = lower_with(&mut arena, iterator, &["list"], &CallSite::statement()).unwrap_err();
    assert!(err.is_not_applicable());
}

/// Keeps the formatted text of every edit.
#[derive(Default)]
struct Edits(Vec<String>);

impl Synthesizer for Edits {
    type Node = ();
    type Error = std::convert::Infallible;

    fn insert_before(&mut self, text: &str) -> Result<(), Self::Error> {
        self.0.push(format_block(text));
        Ok(())
    }

    fn replace_expression(&mut self, target: ReplaceTarget, text: &str) -> Result<(), Self::Error> {
        self.0.push(format!("{target:?} := {text}"));
        Ok(())
    }

    fn delete_statement(&mut self) -> Result<(), Self::Error> {
        self.0.push("delete".to_owned());
        Ok(())
    }
}

#[test]
fn applied_edits_insert_then_replace() {
    let lowered = Lowered {
        before: "boolean b = false;\n".to_owned(),
        loop_nest: "for (int x : xs) {\nif (x > 0) {\nb = true;\nbreak;\n}\n}\n".to_owned(),
        after: String::new(),
        finisher: Some("b".to_owned()),
        disposition: Disposition::Replace(ReplaceTarget::Pipeline),
    };
    let mut edits = Edits::default();
    let applied = apply(&mut edits, &lowered).unwrap();
    assert_eq!(applied.replaced, Some(()));
    assert_eq!(
        edits.0,
        vec![
            "boolean b = false;\nfor (int x : xs) {\n    if (x > 0) {\n        b = true;\n        break;\n    }\n}\n"
                .to_owned(),
            "Pipeline := b".to_owned(),
        ]
    );
}
