// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Helpers shared by the integration tests. Not every test file uses every helper.
#![allow(dead_code)]

use std::rc::Rc;
use symex::collaborators::{Context, RenameLevel};
use symex::expression::{BinaryOperator, Expr};
use symex::options::Options;
use symex::path_state::PathState;
use symex::program::{Program, Statement};
use symex::types::{ExpressionType, TypeTable};

pub fn int(value: i64) -> Rc<Expr> {
    Expr::int(value, ExpressionType::Int)
}

pub fn int_var(name: &str) -> Rc<Expr> {
    Expr::symbol(name, ExpressionType::Int)
}

pub fn int_pointer() -> ExpressionType {
    ExpressionType::pointer_to(ExpressionType::Int)
}

pub fn less_than(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
    Expr::binary(BinaryOperator::LessThan, left, right)
}

pub fn not_equal(left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
    Expr::binary(BinaryOperator::Ne, left, right)
}

/// target = target + 1
pub fn increment(target: Rc<Expr>) -> Statement {
    Statement::assign(target.clone(), Expr::add(target, int(1)))
}

pub fn ret(value: i64) -> Statement {
    Statement::ret(Some(int(value)))
}

/// Declares `struct tuple { int mem1; ... int memN; struct tuple *ptr; }`, where the pointer
/// field is only present if with_pointer is true.
pub fn tuple_types(members: usize, with_pointer: bool) -> (TypeTable, ExpressionType) {
    let tuple = ExpressionType::Struct(Rc::from("tuple"));
    let names: Vec<String> = (1..=members).map(|i| format!("mem{}", i)).collect();
    let mut fields: Vec<(&str, ExpressionType)> = names
        .iter()
        .map(|name| (name.as_str(), ExpressionType::Int))
        .collect();
    if with_pointer {
        fields.push(("ptr", ExpressionType::pointer_to(tuple.clone())));
    }
    let mut types = TypeTable::default();
    let tuple = types.add_struct("tuple", fields);
    (types, tuple)
}

/// A context with the reference collaborators, and a fresh state for a function called "test".
pub fn context(types: TypeTable, options: Options) -> (Context, PathState) {
    (Context::new(Rc::new(types), options), PathState::new("test"))
}

/// Declares name as a local and returns its level 1 form.
pub fn local(ctx: &Context, state: &mut PathState, name: &str, t: ExpressionType) -> Rc<Expr> {
    state.declare_local(&Rc::from(name));
    ctx.rename(state, &Expr::symbol(name, t), RenameLevel::L1)
}

/// The exit codes of all paths through the program.
pub fn exit_codes(outcomes: &[symex::symex::PathOutcome]) -> Vec<Option<i64>> {
    outcomes.iter().map(|o| o.exit_code()).collect()
}

/// A program whose every path is expected to end with the given exit code.
pub struct Scenario {
    pub name: &'static str,
    pub build: fn() -> Program,
    pub expected: i64,
    pub max_unwind: Option<usize>,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "pointer-01",
        build: pointer_01,
        expected: 0,
        max_unwind: None,
    },
    Scenario {
        name: "pointer-02",
        build: pointer_02,
        expected: 2,
        max_unwind: None,
    },
    Scenario {
        name: "pointer-04",
        build: pointer_04,
        expected: 0,
        max_unwind: None,
    },
    Scenario {
        name: "struct-01",
        build: struct_01,
        expected: 1,
        max_unwind: None,
    },
    Scenario {
        name: "struct-02",
        build: struct_02,
        expected: 1,
        max_unwind: None,
    },
    Scenario {
        name: "struct-03",
        build: struct_03,
        expected: 2,
        max_unwind: None,
    },
    Scenario {
        name: "struct-04",
        build: struct_04,
        expected: 1,
        max_unwind: None,
    },
    Scenario {
        name: "struct-05",
        build: struct_05,
        expected: 0,
        max_unwind: None,
    },
    Scenario {
        name: "struct-06",
        build: struct_06,
        expected: 0,
        max_unwind: None,
    },
    Scenario {
        name: "struct-07",
        build: struct_07,
        expected: 0,
        max_unwind: Some(10_001),
    },
    Scenario {
        name: "struct-10",
        build: struct_10,
        expected: 2,
        max_unwind: None,
    },
    Scenario {
        name: "struct-11",
        build: struct_11,
        expected: 2,
        max_unwind: None,
    },
    Scenario {
        name: "struct-12",
        build: struct_12,
        expected: 17,
        max_unwind: None,
    },
];

// int val; int *ptr = &val; val = 1;
// if (!(*ptr && *ptr)) return 1;
// return 0;
pub fn pointer_01() -> Program {
    let val = int_var("val");
    let ptr = Expr::symbol("ptr", int_pointer());
    let deref = Expr::dereference(ptr.clone());
    Program::new(
        "pointer_01",
        TypeTable::default(),
        vec![
            Statement::declare(val.clone(), None),
            Statement::declare(ptr.clone(), Some(Expr::address_of(val.clone()))),
            Statement::assign(val, int(1)),
            Statement::if_then(Expr::not(Expr::and(deref.clone(), deref)), vec![ret(1)]),
            ret(0),
        ],
    )
}

// int val0; int val1; int *ptr = &val1; val0 = 0; val1 = 1;
// if (*ptr && !(*ptr)) return 1;
// ptr = &val0;
// if (!(*ptr || *ptr)) return 2;
// return 0;
pub fn pointer_02() -> Program {
    let val0 = int_var("val0");
    let val1 = int_var("val1");
    let ptr = Expr::symbol("ptr", int_pointer());
    let deref = Expr::dereference(ptr.clone());
    Program::new(
        "pointer_02",
        TypeTable::default(),
        vec![
            Statement::declare(val0.clone(), None),
            Statement::declare(val1.clone(), None),
            Statement::declare(ptr.clone(), Some(Expr::address_of(val1.clone()))),
            Statement::assign(val0.clone(), int(0)),
            Statement::assign(val1, int(1)),
            Statement::if_then(
                Expr::and(deref.clone(), Expr::not(deref.clone())),
                vec![ret(1)],
            ),
            Statement::assign(ptr, Expr::address_of(val0)),
            Statement::if_then(Expr::not(Expr::or(deref.clone(), deref)), vec![ret(2)]),
            ret(0),
        ],
    )
}

const TEST_SIZE: i64 = 64;

// int idx = 0; int *arr[TEST_SIZE];
// while (idx < TEST_SIZE) { arr[idx] = &idx; idx++; }
// idx = 0;
// while (idx < TEST_SIZE - 1) { if (*(arr[idx]) != *(arr[idx + 1])) return 1; idx++; }
// return 0;
pub fn pointer_04() -> Program {
    let idx = int_var("idx");
    let arr = Expr::symbol(
        "arr",
        ExpressionType::array_of(int_pointer(), TEST_SIZE as u64),
    );
    let element = |index: Rc<Expr>| Expr::index(arr.clone(), index);
    Program::new(
        "pointer_04",
        TypeTable::default(),
        vec![
            Statement::declare(idx.clone(), Some(int(0))),
            Statement::declare(arr.clone(), None),
            Statement::while_loop(
                less_than(idx.clone(), int(TEST_SIZE)),
                vec![
                    Statement::assign(element(idx.clone()), Expr::address_of(idx.clone())),
                    increment(idx.clone()),
                ],
            ),
            Statement::assign(idx.clone(), int(0)),
            Statement::while_loop(
                less_than(idx.clone(), int(TEST_SIZE - 1)),
                vec![
                    Statement::if_then(
                        not_equal(
                            Expr::dereference(element(idx.clone())),
                            Expr::dereference(element(Expr::add(idx.clone(), int(1)))),
                        ),
                        vec![ret(1)],
                    ),
                    increment(idx.clone()),
                ],
            ),
            ret(0),
        ],
    )
}

/// struct tuple tup; struct tuple *ptr = &tup; followed by ptr->memN = value for each value.
fn tuple_prelude(
    types: &TypeTable,
    tuple: &ExpressionType,
    values: &[i64],
) -> (Rc<Expr>, Vec<Statement>) {
    let tup = Expr::symbol("tup", tuple.clone());
    let ptr = Expr::symbol("ptr", ExpressionType::pointer_to(tuple.clone()));
    let mut body = vec![
        Statement::declare(tup.clone(), None),
        Statement::declare(ptr.clone(), Some(Expr::address_of(tup))),
    ];
    for (i, value) in values.iter().enumerate() {
        let field = format!("mem{}", i + 1);
        body.push(Statement::assign(
            Expr::arrow(types, ptr.clone(), &field),
            int(*value),
        ));
    }
    (ptr, body)
}

// if (ptr->mem1 && ptr->mem2 && ptr->mem3) return 1;
pub fn struct_01() -> Program {
    let (types, tuple) = tuple_types(3, false);
    let (ptr, mut body) = tuple_prelude(&types, &tuple, &[1, 1, 1]);
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    body.push(Statement::if_then(
        Expr::and(Expr::and(mem("mem1"), mem("mem2")), mem("mem3")),
        vec![ret(1)],
    ));
    body.push(ret(0));
    Program::new("struct_01", types, body)
}

// int x = 1; int y = 1;
// if (ptr->mem1 && x == y && ptr->mem3) return 1;
pub fn struct_02() -> Program {
    let (types, tuple) = tuple_types(3, false);
    let (ptr, mut body) = tuple_prelude(&types, &tuple, &[1, 1, 1]);
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    let x = int_var("x");
    let y = int_var("y");
    body.insert(2, Statement::declare(x.clone(), Some(int(1))));
    body.insert(3, Statement::declare(y.clone(), Some(int(1))));
    body.push(Statement::if_then(
        Expr::and(Expr::and(mem("mem1"), Expr::equals(x, y)), mem("mem3")),
        vec![ret(1)],
    ));
    body.push(ret(0));
    Program::new("struct_02", types, body)
}

// if (ptr->mem1 && ptr->mem2) return 1;
// else if (ptr->mem3 && ptr->mem4) return 2;
pub fn struct_03() -> Program {
    let (types, tuple) = tuple_types(4, false);
    let (ptr, mut body) = tuple_prelude(&types, &tuple, &[1, 0, 1, 1]);
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    body.push(Statement::if_then_else(
        Expr::and(mem("mem1"), mem("mem2")),
        vec![ret(1)],
        vec![Statement::if_then(
            Expr::and(mem("mem3"), mem("mem4")),
            vec![ret(2)],
        )],
    ));
    body.push(ret(0));
    Program::new("struct_03", types, body)
}

/// The prelude of the programs in which the struct points to itself: ptr->ptr = ptr, then the
/// members are set to 1.
fn self_referential_prelude(types: &TypeTable, tuple: &ExpressionType) -> (Rc<Expr>, Vec<Statement>) {
    let (ptr, mut body) = tuple_prelude(types, tuple, &[]);
    body.push(Statement::assign(Expr::arrow(types, ptr.clone(), "ptr"), ptr.clone()));
    for field in ["mem1", "mem2", "mem3"] {
        body.push(Statement::assign(Expr::arrow(types, ptr.clone(), field), int(1)));
    }
    (ptr, body)
}

// ptr->ptr = ptr;
// if (ptr->mem1 && ptr->ptr->mem2 && ptr->ptr->mem3) return 1;
pub fn struct_04() -> Program {
    let (types, tuple) = tuple_types(3, true);
    let (ptr, mut body) = self_referential_prelude(&types, &tuple);
    let inner = Expr::arrow(&types, ptr.clone(), "ptr");
    body.push(Statement::if_then(
        Expr::and(
            Expr::and(
                Expr::arrow(&types, ptr.clone(), "mem1"),
                Expr::arrow(&types, inner.clone(), "mem2"),
            ),
            Expr::arrow(&types, inner, "mem3"),
        ),
        vec![ret(1)],
    ));
    body.push(ret(0));
    Program::new("struct_04", types, body)
}

// while (ptr->mem1 < 10 && ptr->mem2 && ptr->mem3) ptr->mem1++;
pub fn struct_05() -> Program {
    let (types, tuple) = tuple_types(3, true);
    let (ptr, mut body) = self_referential_prelude(&types, &tuple);
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    body.push(Statement::while_loop(
        Expr::and(
            Expr::and(less_than(mem("mem1"), int(10)), mem("mem2")),
            mem("mem3"),
        ),
        vec![increment(mem("mem1"))],
    ));
    body.push(ret(0));
    Program::new("struct_05", types, body)
}

// while (ptr->ptr->mem1 < 10 && ptr->mem2 && ptr->mem3) ptr->ptr->mem1++;
pub fn struct_06() -> Program {
    let (types, tuple) = tuple_types(3, true);
    let (ptr, mut body) = self_referential_prelude(&types, &tuple);
    let tup2 = Expr::symbol("tup2", tuple.clone());
    body.insert(1, Statement::declare(tup2, None));
    let inner = Expr::arrow(&types, ptr.clone(), "ptr");
    let deep_mem1 = Expr::arrow(&types, inner, "mem1");
    body.push(Statement::while_loop(
        Expr::and(
            Expr::and(
                less_than(deep_mem1.clone(), int(10)),
                Expr::arrow(&types, ptr.clone(), "mem2"),
            ),
            Expr::arrow(&types, ptr.clone(), "mem3"),
        ),
        vec![increment(deep_mem1)],
    ));
    body.push(ret(0));
    Program::new("struct_06", types, body)
}

// while (ptr->mem1 < 10000) { if (!(ptr->mem2 && ptr->mem3)) return 3; ptr->mem1++; }
pub fn struct_07() -> Program {
    let (types, tuple) = tuple_types(3, true);
    let (ptr, mut body) = self_referential_prelude(&types, &tuple);
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    body.push(Statement::while_loop(
        less_than(mem("mem1"), int(10_000)),
        vec![
            Statement::if_then(
                Expr::not(Expr::and(mem("mem2"), mem("mem3"))),
                vec![ret(3)],
            ),
            increment(mem("mem1")),
        ],
    ));
    body.push(ret(0));
    Program::new("struct_07", types, body)
}

// struct tuple tup1, tup2; struct tuple *ptr = &tup1;
// A: mem1 = 1, mem2 = 0, mem3 = 1, mem4 = 1; B: mem1 = 0, mem2 = 0, mem3 = 1, mem4 = 1
// if (ptr->mem1 && ptr->mem2) return 1;
// ptr = &tup2;
// if (ptr->mem3 && ptr->mem4) return 2;
pub fn struct_10() -> Program {
    let (types, tuple) = tuple_types(4, true);
    let tup1 = Expr::symbol("tup1", tuple.clone());
    let tup2 = Expr::symbol("tup2", tuple.clone());
    let ptr = Expr::symbol("ptr", ExpressionType::pointer_to(tuple.clone()));
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    let mut body = vec![
        Statement::declare(tup1.clone(), None),
        Statement::declare(tup2.clone(), None),
        Statement::declare(ptr.clone(), Some(Expr::address_of(tup1))),
    ];
    for (field, value) in [("mem1", 1), ("mem2", 0), ("mem3", 1), ("mem4", 1)] {
        body.push(Statement::assign(mem(field), int(value)));
    }
    body.push(Statement::assign(mem("ptr"), ptr.clone()));
    for (field, value) in [("mem1", 0), ("mem2", 0), ("mem3", 1), ("mem4", 1)] {
        body.push(Statement::assign(
            Expr::member(&types, tup2.clone(), field),
            int(value),
        ));
    }
    body.push(Statement::assign(
        Expr::member(&types, tup2.clone(), "ptr"),
        Expr::address_of(tup2.clone()),
    ));
    body.push(Statement::if_then(
        Expr::and(mem("mem1"), mem("mem2")),
        vec![ret(1)],
    ));
    body.push(Statement::assign(ptr.clone(), Expr::address_of(tup2)));
    body.push(Statement::if_then(
        Expr::and(mem("mem3"), mem("mem4")),
        vec![ret(2)],
    ));
    body.push(ret(0));
    Program::new("struct_10", types, body)
}

// if (ptr->mem1 && ptr->mem2) return 1;
// ptr->mem2 = 1;
// if (ptr->mem1 && ptr->mem2) return 2;
pub fn struct_11() -> Program {
    let (types, tuple) = tuple_types(4, false);
    let (ptr, mut body) = tuple_prelude(&types, &tuple, &[1, 0, 1, 1]);
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    body.push(Statement::if_then(
        Expr::and(mem("mem1"), mem("mem2")),
        vec![ret(1)],
    ));
    body.push(Statement::assign(mem("mem2"), int(1)));
    body.push(Statement::if_then(
        Expr::and(mem("mem1"), mem("mem2")),
        vec![ret(2)],
    ));
    body.push(ret(0));
    Program::new("struct_11", types, body)
}

// struct tuple tup1, tup2; struct tuple *ptr = &tup1; struct tuple *old = &tup2; int i = 0;
// ptr->ptr = ptr; ptr->memN = 1; tup2.memN = 2; tup2.ptr = &tup2;
// while (ptr->ptr->mem1 < 10 && ptr->mem2 && ptr->mem3) {
//   ptr->ptr->mem1++;
//   struct tuple *tmp = ptr; ptr = old; old = tmp;
//   i++;
// }
// return i;
pub fn struct_12() -> Program {
    let (types, tuple) = tuple_types(3, true);
    let tuple_pointer = ExpressionType::pointer_to(tuple.clone());
    let tup1 = Expr::symbol("tup1", tuple.clone());
    let tup2 = Expr::symbol("tup2", tuple.clone());
    let ptr = Expr::symbol("ptr", tuple_pointer.clone());
    let old = Expr::symbol("old", tuple_pointer.clone());
    let tmp = Expr::symbol("tmp", tuple_pointer);
    let i = int_var("i");
    let mem = |f: &str| Expr::arrow(&types, ptr.clone(), f);
    let mut body = vec![
        Statement::declare(tup1.clone(), None),
        Statement::declare(tup2.clone(), None),
        Statement::declare(ptr.clone(), Some(Expr::address_of(tup1))),
        Statement::declare(old.clone(), Some(Expr::address_of(tup2.clone()))),
        Statement::declare(i.clone(), Some(int(0))),
        Statement::assign(mem("ptr"), ptr.clone()),
    ];
    for field in ["mem1", "mem2", "mem3"] {
        body.push(Statement::assign(mem(field), int(1)));
    }
    for field in ["mem1", "mem2", "mem3"] {
        body.push(Statement::assign(
            Expr::member(&types, tup2.clone(), field),
            int(2),
        ));
    }
    body.push(Statement::assign(
        Expr::member(&types, tup2.clone(), "ptr"),
        Expr::address_of(tup2),
    ));
    let deep_mem1 = Expr::arrow(&types, mem("ptr"), "mem1");
    body.push(Statement::while_loop(
        Expr::and(
            Expr::and(less_than(deep_mem1.clone(), int(10)), mem("mem2")),
            mem("mem3"),
        ),
        vec![
            increment(deep_mem1),
            Statement::declare(tmp.clone(), Some(ptr.clone())),
            Statement::assign(ptr.clone(), old.clone()),
            Statement::assign(old, tmp),
            increment(i.clone()),
        ],
    ));
    body.push(Statement::ret(Some(i)));
    Program::new("struct_12", types, body)
}
