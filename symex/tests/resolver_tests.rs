// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Tests of the individual steps of dereference resolution.

mod common;

use common::{context, exit_codes, int, int_pointer, int_var, local, tuple_types};
use pretty_assertions::assert_eq;
use std::rc::Rc;
use symex::collaborators::{Alternative, AssignmentKind, Context, PointsToOracle, SafetyOracle};
use symex::dereference::Dereferencer;
use symex::errors::SymexError;
use symex::expression::{BinaryOperator, Expr, Expression};
use symex::object_descriptor::ObjectDescriptor;
use symex::options::Options;
use symex::path_state::PathState;
use symex::program::{Program, Statement};
use symex::resolver::{resolve, CACHED_DEREFERENCE_PREFIX};
use symex::subexpression_cache::SubexpressionCache;
use symex::symex::SymbolicExecutor;
use symex::types::{ExpressionType, TypeTable};
use symex::valuation::ConcreteValue;

fn uncached() -> Options {
    let mut options = Options::default();
    options.dereference_cache = false;
    options.run_validation_checks = true;
    options
}

fn cached() -> Options {
    let mut options = Options::default();
    options.run_validation_checks = true;
    options
}

fn assign(ctx: &Context, state: &mut PathState, target: &Rc<Expr>, value: Rc<Expr>) {
    state
        .assign_symbol(ctx, target, &value, &Expr::bool(true), AssignmentKind::State)
        .unwrap();
}

/// x, and p = &x, both locals.
fn pointer_to_local(ctx: &Context, state: &mut PathState) -> (Rc<Expr>, Rc<Expr>) {
    let x = local(ctx, state, "x", ExpressionType::Int);
    let p = local(ctx, state, "p", int_pointer());
    assign(ctx, state, &p, Expr::address_of(x.clone()));
    (x, p)
}

#[derive(Debug)]
struct AlwaysValid {}

impl SafetyOracle for AlwaysValid {
    fn is_always_valid(&self, _dereference: &Rc<Expr>, _function: &str, _point: usize) -> bool {
        true
    }
}

#[derive(Debug)]
struct NoObjects {}

impl PointsToOracle for NoObjects {
    fn resolve_pointer(
        &self,
        _ns: &TypeTable,
        _state: &PathState,
        _pointer: &Rc<Expr>,
        _allow_fast_path_if_safe: bool,
    ) -> symex::errors::Result<Vec<Alternative>> {
        Ok(vec![])
    }
}

#[test]
fn descriptor_of_member_uses_field_offset() {
    let (types, tuple) = tuple_types(3, false);
    let tup = Expr::symbol("tup", tuple);
    let member = Expr::member(&types, tup.clone(), "mem3");
    let (ctx, _) = context(types.clone(), uncached());
    let descriptor = ObjectDescriptor::build(&types, &member).unwrap();
    assert_eq!(descriptor.root, tup);
    assert_eq!(descriptor.target_type, ExpressionType::Int);
    assert_eq!(ctx.simplify(&descriptor.offset).as_int_if_known(), Some(8));
}

#[test]
fn descriptor_of_index_scales_by_element_size() {
    let types = TypeTable::default();
    let arr = Expr::symbol("arr", ExpressionType::array_of(ExpressionType::Int, 10));
    let element = Expr::index(arr.clone(), int(2));
    let (ctx, _) = context(types.clone(), uncached());
    let descriptor = ObjectDescriptor::build(&types, &element).unwrap();
    assert_eq!(descriptor.root, arr);
    assert_eq!(ctx.simplify(&descriptor.offset).as_int_if_known(), Some(8));
}

#[test]
fn descriptor_stops_at_dereference() {
    let (types, tuple) = tuple_types(3, false);
    let ptr = Expr::symbol("ptr", ExpressionType::pointer_to(tuple));
    let member = Expr::arrow(&types, ptr.clone(), "mem2");
    let descriptor = ObjectDescriptor::build(&types, &member).unwrap();
    assert_eq!(descriptor.root, Expr::dereference(ptr));
    assert_eq!(descriptor.offset, Expr::offset(4));
}

#[test]
fn descriptor_rejects_member_of_non_struct() {
    let types = TypeTable::default();
    let member = Expr::new(
        Expression::Member {
            operand: int_var("x"),
            field: Rc::from("f"),
        },
        ExpressionType::Int,
    );
    match ObjectDescriptor::build(&types, &member) {
        Err(SymexError::UnsupportedConstruct { kind, .. }) => assert_eq!(kind, "member"),
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn address_of_symbol() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let x = local(&ctx, &mut state, "x", ExpressionType::Int);
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&x, false)
        .unwrap();
    assert_eq!(address, Expr::address_of(x));
}

#[test]
fn address_of_member_is_byte_arithmetic() {
    let (types, tuple) = tuple_types(3, false);
    let (ctx, mut state) = context(types.clone(), uncached());
    let tup = local(&ctx, &mut state, "tup", tuple);
    let member = Expr::member(&types, tup.clone(), "mem2");
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&member, false)
        .unwrap();
    let expected = Expr::cast(
        Expr::add(
            Expr::cast(Expr::address_of(tup), ExpressionType::char_pointer()),
            Expr::offset(4),
        ),
        int_pointer(),
    );
    assert_eq!(address, expected);
}

#[test]
fn address_of_dereference_is_the_pointer() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let (_, p) = pointer_to_local(&ctx, &mut state);
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&Expr::dereference(p.clone()), false)
        .unwrap();
    assert_eq!(address, p);
}

#[test]
fn array_decays_to_first_element() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let arr = local(
        &ctx,
        &mut state,
        "arr",
        ExpressionType::array_of(ExpressionType::Int, 4),
    );
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&arr, false)
        .unwrap();
    assert_eq!(
        address,
        Expr::address_of(Expr::index(arr.clone(), Expr::offset(0)))
    );
    let whole = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&arr, true)
        .unwrap();
    assert_eq!(whole, Expr::address_of(arr));
}

#[test]
fn dereference_of_known_pointer() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let (x, p) = pointer_to_local(&ctx, &mut state);
    let resolved = resolve(&ctx, &mut state, &Expr::dereference(p), false).unwrap();
    assert_eq!(resolved, x);
    assert_eq!(state.dereference_resolutions, 1);
}

#[test]
fn dereference_of_unknown_pointer_reads_failed_object() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let p = local(&ctx, &mut state, "p", int_pointer());
    state.havoc_symbol(&p).unwrap();
    let resolved = resolve(&ctx, &mut state, &Expr::dereference(p), false).unwrap();
    let symbol = resolved.as_symbol().unwrap();
    assert_eq!(symbol.name.as_ref(), "p$object");
}

#[test]
fn possibly_null_pointer_is_guarded() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let x = local(&ctx, &mut state, "x", ExpressionType::Int);
    let p = local(&ctx, &mut state, "p", int_pointer());
    let c = Expr::symbol("c", ExpressionType::Bool);
    assign(
        &ctx,
        &mut state,
        &p,
        Expr::conditional(c, Expr::address_of(x.clone()), Expr::null(int_pointer())),
    );
    let resolved = resolve(&ctx, &mut state, &Expr::dereference(p), false).unwrap();
    match &resolved.expression {
        Expression::ConditionalExpression {
            consequent,
            alternate,
            ..
        } => {
            assert_eq!(consequent, &x);
            assert_eq!(alternate.as_symbol().unwrap().name.as_ref(), "p$object");
        }
        _ => panic!("expected a conditional, got {}", resolved),
    }
}

#[test]
fn always_valid_dereference_takes_fast_path() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let ctx = ctx.with_safety_oracle(Box::new(AlwaysValid {}));
    let x = local(&ctx, &mut state, "x", ExpressionType::Int);
    let p = local(&ctx, &mut state, "p", int_pointer());
    let c = Expr::symbol("c", ExpressionType::Bool);
    assign(
        &ctx,
        &mut state,
        &p,
        Expr::conditional(c, Expr::address_of(x.clone()), Expr::null(int_pointer())),
    );
    let resolved = resolve(&ctx, &mut state, &Expr::dereference(p), false).unwrap();
    assert_eq!(resolved, x);
}

#[test]
fn empty_points_to_set_is_a_tool_defect() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let ctx = ctx.with_points_to_oracle(Box::new(NoObjects {}));
    let (_, p) = pointer_to_local(&ctx, &mut state);
    match resolve(&ctx, &mut state, &Expr::dereference(p), false) {
        Err(error @ SymexError::EmptyPointsToSet(..)) => assert!(error.is_tool_defect()),
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn index_into_pointer_is_unsupported() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let (_, p) = pointer_to_local(&ctx, &mut state);
    let element = Expr::index(p, int(0));
    match resolve(&ctx, &mut state, &element, false) {
        Err(SymexError::UnsupportedConstruct { kind, .. }) => {
            assert_eq!(kind, "index into a pointer")
        }
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn address_of_index_into_pointer_is_unsupported() {
    for options in [cached(), uncached()] {
        let (ctx, mut state) = context(TypeTable::default(), options);
        let (_, p) = pointer_to_local(&ctx, &mut state);
        let address = Expr::address_of(Expr::index(p, int(0)));
        match resolve(&ctx, &mut state, &address, false) {
            Err(SymexError::UnsupportedConstruct { kind, .. }) => {
                assert_eq!(kind, "index into a pointer")
            }
            result => panic!("unexpected {:?}", result),
        }
    }
}

#[test]
fn descriptor_rejects_index_into_pointer() {
    let (types, tuple) = tuple_types(2, false);
    let ptr = Expr::symbol("ptr", ExpressionType::pointer_to(tuple));
    // ptr[1].mem2
    let member = Expr::member(&types, Expr::index(ptr, int(1)), "mem2");
    match ObjectDescriptor::build(&types, &member) {
        Err(SymexError::UnsupportedConstruct { kind, .. }) => {
            assert_eq!(kind, "index into a pointer")
        }
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn address_of_conditional_is_conditional_address() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let a = local(&ctx, &mut state, "a", ExpressionType::Int);
    let b = local(&ctx, &mut state, "b", ExpressionType::Int);
    let c = Expr::symbol("c", ExpressionType::Bool);
    let lvalue = Expr::conditional(c.clone(), a.clone(), b.clone());
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&lvalue, false)
        .unwrap();
    assert_eq!(
        address,
        Expr::conditional(c, Expr::address_of(a), Expr::address_of(b))
    );
}

#[test]
fn address_of_typecast_is_recast() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let x = local(&ctx, &mut state, "x", ExpressionType::Int);
    let lvalue = Expr::cast(x.clone(), ExpressionType::Long);
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&lvalue, false)
        .unwrap();
    assert_eq!(
        address,
        Expr::cast(
            Expr::address_of(x),
            ExpressionType::pointer_to(ExpressionType::Long)
        )
    );
}

#[test]
fn byte_extract_of_nested_array_starts_at_innermost_element() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let row = ExpressionType::array_of(ExpressionType::Int, 3);
    let m = local(&ctx, &mut state, "m", ExpressionType::array_of(row, 2));
    let lvalue = Expr::byte_extract(m.clone(), Expr::offset(4), ExpressionType::Int);
    let address = Dereferencer::new(&ctx, &mut state)
        .address_arithmetic(&lvalue, false)
        .unwrap();
    let first = Expr::index(Expr::index(m.clone(), Expr::offset(0)), Expr::offset(0));
    let expected = Expr::cast(
        Expr::add(
            Expr::cast(Expr::address_of(first), ExpressionType::char_pointer()),
            Expr::offset(4),
        ),
        int_pointer(),
    );
    assert_eq!(address, expected);

    let whole = state.evaluate(&ctx, &Expr::address_of(m));
    let element = state.evaluate(&ctx, &address);
    match (whole, element) {
        (
            Some(ConcreteValue::Pointer { object: o1, offset: 0 }),
            Some(ConcreteValue::Pointer { object: o2, offset: 4 }),
        ) => assert_eq!(o1, o2),
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn field_symbol_is_addressed_through_its_root() {
    let (types, tuple) = tuple_types(3, false);
    let (ctx, mut state) = context(types.clone(), uncached());
    let tup = local(&ctx, &mut state, "tup", tuple.clone());
    let field = |name: &str| {
        let symbol = tup.as_symbol().unwrap().field(&tuple, &Rc::from(name));
        Expr::from_symbol(symbol, ExpressionType::Int)
    };

    let mut dereferencer = Dereferencer::new(&ctx, &mut state);
    let mem2 = dereferencer.address_arithmetic(&field("mem2"), false).unwrap();
    let member = dereferencer
        .address_arithmetic(&Expr::member(&types, tup.clone(), "mem2"), false)
        .unwrap();
    assert_eq!(mem2, member);

    // The first field starts where the struct does.
    let mem1 = dereferencer.address_arithmetic(&field("mem1"), false).unwrap();
    assert_eq!(mem1, Expr::address_of(field("mem1")));
}

#[test]
fn address_of_value_is_unsupported() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let a = local(&ctx, &mut state, "a", ExpressionType::Int);
    let b = local(&ctx, &mut state, "b", ExpressionType::Int);
    let address = Expr::address_of(Expr::add(a, b));
    match resolve(&ctx, &mut state, &address, false) {
        Err(SymexError::UnsupportedConstruct { kind, .. }) => assert_eq!(kind, "binary"),
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn address_of_mistyped_lvalue_is_an_invariant_violation() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let a = local(&ctx, &mut state, "a", ExpressionType::Int);
    let b = local(&ctx, &mut state, "b", ExpressionType::Int);
    // A conditional claiming to be a long, with int branches.
    let lvalue = Expr::new(
        Expression::ConditionalExpression {
            condition: Expr::symbol("c", ExpressionType::Bool),
            consequent: a,
            alternate: b,
        },
        ExpressionType::Long,
    );
    let result = Dereferencer::new(&ctx, &mut state).address_arithmetic(&lvalue, false);
    match result {
        Err(error @ SymexError::InvariantViolation(..)) => assert!(error.is_tool_defect()),
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn cast_address_of_array_is_address_of_first_element() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let arr = local(
        &ctx,
        &mut state,
        "arr",
        ExpressionType::array_of(ExpressionType::Int, 4),
    );
    // (int *)&arr
    let cast = Expr::cast(Expr::address_of(arr.clone()), int_pointer());
    let first = Expr::address_of(Expr::index(arr.clone(), Expr::offset(0)));
    let mut dereferencer = Dereferencer::new(&ctx, &mut state);
    let rewritten = dereferencer.dereference_rec(&cast, false).unwrap();
    assert_eq!(rewritten, dereferencer.dereference_rec(&first, false).unwrap());
    assert_eq!(rewritten.expr_type, int_pointer());

    let start = state.evaluate(&ctx, &Expr::address_of(arr));
    match state.evaluate(&ctx, &rewritten) {
        Some(pointer @ ConcreteValue::Pointer { offset: 0, .. }) => {
            assert_eq!(Some(pointer), start)
        }
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn overflowing_pointer_arithmetic_is_unknown() {
    let (ctx, mut state) = context(TypeTable::default(), uncached());
    let (_, p) = pointer_to_local(&ctx, &mut state);
    let q = local(&ctx, &mut state, "q", int_pointer());
    let huge = Expr::int(0x2000_0000_0000_0000, ExpressionType::Long);
    let beyond = Expr::add(p.clone(), huge);
    assign(&ctx, &mut state, &q, beyond.clone());

    let value = |state: &PathState, expr: &Rc<Expr>| {
        let expr = ctx.rename(state, expr, symex::collaborators::RenameLevel::L2);
        state.evaluate(&ctx, &expr)
    };
    assert_eq!(value(&state, &beyond), None);
    assert_eq!(value(&state, &q), None);
    let below = Expr::binary(
        BinaryOperator::Sub,
        p.clone(),
        Expr::int(i64::MIN, ExpressionType::Long),
    );
    assert_eq!(value(&state, &below), None);
    assert!(value(&state, &p).is_some());
}

#[test]
fn flexible_array_member_is_indexed_past_the_struct() {
    let mut types = TypeTable::default();
    let buf = types.add_struct(
        "buf",
        vec![
            ("len", ExpressionType::Int),
            ("data", ExpressionType::array_of(ExpressionType::Int, 0)),
        ],
    );
    let (ctx, mut state) = context(types.clone(), cached());
    let b = local(&ctx, &mut state, "b", buf.clone());
    let q = local(&ctx, &mut state, "q", ExpressionType::pointer_to(buf));
    assign(&ctx, &mut state, &q, Expr::address_of(b.clone()));

    let element = Expr::index(Expr::arrow(&types, q, "data"), int(1));
    let resolved = resolve(&ctx, &mut state, &element, false).unwrap();
    match &resolved.expression {
        Expression::ByteExtract { operand, offset } => {
            assert_eq!(operand, &b);
            assert_eq!(offset.as_int_if_known(), Some(8));
        }
        _ => panic!("expected a byte extract, got {}", resolved),
    }
    // The struct itself is not cached, since its copy would not hold the array.
    assert!(state.cache.is_empty());
}

#[test]
fn read_is_cached_until_object_is_written() {
    let (ctx, mut state) = context(TypeTable::default(), cached());
    let (x, p) = pointer_to_local(&ctx, &mut state);
    assign(&ctx, &mut state, &x, int(1));

    let deref = Expr::dereference(p);
    let first = resolve(&ctx, &mut state, &deref, false).unwrap();
    assert!(first
        .as_symbol()
        .unwrap()
        .name
        .starts_with(CACHED_DEREFERENCE_PREFIX));
    // '#' starts the version in the display of a symbol.
    assert!(!first.as_symbol().unwrap().name.contains('#'));
    let second = resolve(&ctx, &mut state, &deref, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(state.dereference_resolutions, 1);
    assert_eq!(state.cache.len(), 1);

    assign(&ctx, &mut state, &x, int(2));
    assert!(state.cache.is_empty());
    let third = resolve(&ctx, &mut state, &deref, false).unwrap();
    assert_ne!(first, third);
    assert_eq!(state.dereference_resolutions, 2);

    let value = ctx.rename(&state, &third, symex::collaborators::RenameLevel::L2);
    assert_eq!(state.evaluate(&ctx, &value).and_then(|v| v.as_int()), Some(2));
}

#[test]
fn write_target_is_not_cached() {
    let (ctx, mut state) = context(TypeTable::default(), cached());
    let (x, p) = pointer_to_local(&ctx, &mut state);
    let target = resolve(&ctx, &mut state, &Expr::dereference(p), true).unwrap();
    assert_eq!(target, x);
    assert!(state.cache.is_empty());
}

#[test]
fn pointer_inside_write_target_is_cached() {
    // **pp = 1 reads *pp but writes **pp
    let (ctx, mut state) = context(TypeTable::default(), cached());
    let (x, p) = pointer_to_local(&ctx, &mut state);
    let pp = local(&ctx, &mut state, "pp", ExpressionType::pointer_to(int_pointer()));
    assign(&ctx, &mut state, &pp, Expr::address_of(p));
    let target = resolve(
        &ctx,
        &mut state,
        &Expr::dereference(Expr::dereference(pp)),
        true,
    )
    .unwrap();
    assert_eq!(target, x);
    assert_eq!(state.cache.len(), 1);
}

#[test]
fn cache_eviction_cascades_through_aux_symbols() {
    let pointer = |name: &str| Expr::dereference(Expr::symbol(name, int_pointer()));
    let aux = |name: &str| Expr::symbol(name, ExpressionType::Int);
    let keys = |names: &[&str]| names.iter().map(|n| Rc::from(*n)).collect::<Vec<Rc<str>>>();

    let mut cache = SubexpressionCache::default();
    cache.add(pointer("p"), aux("aux1"), keys(&["p", "x"]));
    cache.add(pointer("q"), aux("aux2"), keys(&["q", "aux1"]));
    cache.add(pointer("r"), aux("aux3"), keys(&["r", "y"]));
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.lookup(&pointer("q")), Some(aux("aux2")));

    assert_eq!(cache.invalidate(&Rc::from("x")), 2);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.lookup(&pointer("p")), None);
    assert_eq!(cache.lookup(&pointer("q")), None);
    assert_eq!(cache.lookup(&pointer("r")), Some(aux("aux3")));
    assert!(!cache.touches("p"));
    assert!(cache.touches("y"));

    assert_eq!(cache.invalidate(&Rc::from("unrelated")), 0);
}

#[test]
fn forked_caches_are_independent() {
    let key = Expr::dereference(Expr::symbol("p", int_pointer()));
    let mut cache = SubexpressionCache::default();
    cache.add(key.clone(), int_var("aux1"), vec![Rc::from("x")]);
    let fork = cache.clone();
    cache.invalidate(&Rc::from("x"));
    assert!(cache.is_empty());
    assert_eq!(fork.lookup(&key), Some(int_var("aux1")));
}

// struct node { int val; struct node *next; };
// input p; p->next->val = 5; return p->next->val;
fn linked_input() -> Program {
    let mut types = TypeTable::default();
    let node = ExpressionType::Struct(Rc::from("node"));
    let node = types.add_struct(
        "node",
        vec![
            ("val", ExpressionType::Int),
            ("next", ExpressionType::pointer_to(node)),
        ],
    );
    let p = Expr::symbol("p", ExpressionType::pointer_to(node));
    let val = Expr::arrow(&types, Expr::arrow(&types, p.clone(), "next"), "val");
    Program::new(
        "linked_input",
        types,
        vec![
            Statement::input(p),
            Statement::assign(val.clone(), int(5)),
            Statement::ret(Some(val)),
        ],
    )
}

#[test]
fn input_pointers_point_to_auto_objects() {
    for options in [cached(), uncached()] {
        let outcomes = SymbolicExecutor::new(options).execute(&linked_input());
        assert_eq!(exit_codes(&outcomes), vec![Some(5)]);
        // p->next was initialized to point to a fresh object
        assert!(outcomes[0].hidden_assignments > 0);
    }
}

#[test]
fn safety_analysis_finds_guarded_dereferences() {
    // if (p != NULL) { x = *p; }
    let p = Expr::symbol("p", int_pointer());
    let x = int_var("x");
    let program = Program::new(
        "guarded",
        TypeTable::default(),
        vec![
            Statement::input(p.clone()),
            Statement::declare(x.clone(), None),
            Statement::if_then(
                common::not_equal(p.clone(), Expr::null(int_pointer())),
                vec![Statement::assign(x, Expr::dereference(p.clone()))],
            ),
        ],
    );
    let analysis = symex::safety::LocalSafePointers::analyze(&program);
    let deref = Expr::dereference(p);
    assert_eq!(analysis.safe_dereferences_at(3).map(|set| set.len()), Some(1));
    assert!(analysis.is_always_valid(&deref, "guarded", 3));
    assert!(!analysis.is_always_valid(&deref, "guarded", 2));
    assert!(!analysis.is_always_valid(&deref, "other", 3));
}
