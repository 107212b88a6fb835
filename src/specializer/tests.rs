use super::*;
use crate::parser::parse;
use pretty_assertions::assert_eq;

fn body(trigger: &Trigger) -> Vec<Statement> {
    trigger.body().iter().map(|s| s.as_ref().clone()).collect()
}

fn assign(raw: &str) -> Statement {
    Statement::Sql {
        kind: SqlKind::Assignment,
        raw: raw.to_string(),
    }
}

#[test]
fn test_unguarded_tree_is_shared() {
    let trigger = parse("BEGIN v := 1; IF :NEW.x > 0 THEN v := 2; END IF; END;").unwrap();
    for op in Operation::ALL {
        let specialized = specialize(&trigger, op);
        assert!(Arc::ptr_eq(&specialized.main, &trigger.main));
        assert!(Arc::ptr_eq(&specialized.declarations, &trigger.declarations));
    }
}

#[test]
fn test_inserting_guard_only_in_insert() {
    let trigger = parse(
        "DECLARE my_exc EXCEPTION;
         BEGIN
           IF (INSERTING) THEN RAISE my_exc; END IF;
         END;",
    )
    .unwrap();

    let insert = specialize(&trigger, Operation::Insert);
    assert_eq!(
        body(&insert),
        vec![Statement::Raise {
            exception_name: Some("my_exc".to_string())
        }]
    );
    assert!(specialize(&trigger, Operation::Update).body().is_empty());
    assert!(specialize(&trigger, Operation::Delete).body().is_empty());
}

#[test]
fn test_unguarded_statement_appears_in_every_tree() {
    let trigger = parse(
        "BEGIN
           v := 0;
           IF DELETING THEN v := 1; END IF;
         END;",
    )
    .unwrap();
    for op in Operation::ALL {
        let specialized = specialize(&trigger, op);
        assert!(Arc::ptr_eq(&specialized.body()[0], &trigger.body()[0]));
    }
    assert_eq!(body(&specialize(&trigger, Operation::Insert)), vec![assign("v := 0")]);
    assert_eq!(
        body(&specialize(&trigger, Operation::Delete)),
        vec![assign("v := 0"), assign("v := 1")]
    );
}

#[test]
fn test_elsif_chain_keeps_exactly_one_arm() {
    let trigger = parse(
        "BEGIN
           IF INSERTING THEN a := 1;
           ELSIF UPDATING THEN a := 2;
           ELSE a := 3;
           END IF;
         END;",
    )
    .unwrap();

    assert_eq!(body(&specialize(&trigger, Operation::Insert)), vec![assign("a := 1")]);
    assert_eq!(body(&specialize(&trigger, Operation::Update)), vec![assign("a := 2")]);
    assert_eq!(body(&specialize(&trigger, Operation::Delete)), vec![assign("a := 3")]);
}

#[test]
fn test_mixed_condition_elides_predicate() {
    let trigger = parse(
        "BEGIN
           IF INSERTING AND :NEW.x IS NULL THEN v := 1; END IF;
         END;",
    )
    .unwrap();

    let insert = specialize(&trigger, Operation::Insert);
    assert_eq!(
        body(&insert),
        vec![Statement::IfElse {
            branches: vec![Branch {
                condition: ":NEW.x IS NULL".to_string(),
                body: vec![Arc::new(assign("v := 1"))],
            }],
            else_body: Vec::new(),
        }]
    );
    assert!(specialize(&trigger, Operation::Update).body().is_empty());
}

#[test]
fn test_data_dependent_guard_unchanged() {
    let trigger = parse("BEGIN IF (:NEW.X IS NULL) THEN v := 1; END IF; END;").unwrap();
    for op in Operation::ALL {
        assert_eq!(specialize(&trigger, op), trigger);
    }
}

#[test]
fn test_data_dependent_chain_drops_foreign_arm() {
    let trigger = parse(
        "BEGIN
           IF :NEW.a IS NULL THEN v := 1;
           ELSIF DELETING THEN v := 2;
           ELSE v := 3;
           END IF;
         END;",
    )
    .unwrap();

    let insert = specialize(&trigger, Operation::Insert);
    assert_eq!(
        body(&insert),
        vec![Statement::IfElse {
            branches: vec![Branch {
                condition: ":NEW.a IS NULL".to_string(),
                body: vec![Arc::new(assign("v := 1"))],
            }],
            else_body: vec![Arc::new(assign("v := 3"))],
        }]
    );

    // DELETING matches statically, so it becomes the ELSE.
    let delete = specialize(&trigger, Operation::Delete);
    assert_eq!(
        body(&delete),
        vec![Statement::IfElse {
            branches: vec![Branch {
                condition: ":NEW.a IS NULL".to_string(),
                body: vec![Arc::new(assign("v := 1"))],
            }],
            else_body: vec![Arc::new(assign("v := 2"))],
        }]
    );
}

#[test]
fn test_searched_case_on_operations() {
    let trigger = parse(
        "BEGIN
           CASE
             WHEN INSERTING THEN v := 'I';
             WHEN DELETING THEN v := 'D';
             ELSE v := 'U';
           END CASE;
         END;",
    )
    .unwrap();

    assert_eq!(body(&specialize(&trigger, Operation::Insert)), vec![assign("v := 'I'")]);
    assert_eq!(body(&specialize(&trigger, Operation::Update)), vec![assign("v := 'U'")]);
    assert_eq!(body(&specialize(&trigger, Operation::Delete)), vec![assign("v := 'D'")]);
}

#[test]
fn test_handler_kept_while_block_can_raise() {
    let trigger = parse(
        "BEGIN
           SELECT a INTO v FROM t WHERE id = 1;
         EXCEPTION
           WHEN NO_DATA_FOUND THEN
             IF INSERTING THEN v := 0; END IF;
         END;",
    )
    .unwrap();

    let update = specialize(&trigger, Operation::Update);
    assert_eq!(update.handlers().len(), 1);
    assert_eq!(update.handlers()[0].exception_name, "NO_DATA_FOUND");
    assert!(update.handlers()[0].body[0].is_noop());
}

#[test]
fn test_unreachable_handler_is_dropped() {
    let trigger = parse(
        "DECLARE bad_row EXCEPTION;
         BEGIN
           IF INSERTING THEN RAISE bad_row; END IF;
           v := 1;
         EXCEPTION
           WHEN bad_row THEN
             IF INSERTING THEN v := 0; END IF;
         END;",
    )
    .unwrap();

    let update = specialize(&trigger, Operation::Update);
    assert_eq!(body(&update), vec![assign("v := 1")]);
    assert!(update.handlers().is_empty());

    let insert = specialize(&trigger, Operation::Insert);
    assert_eq!(insert.handlers().len(), 1);
    assert_eq!(*insert.handlers()[0].body[0], assign("v := 0"));
}

#[test]
fn test_emptied_loop_is_omitted() {
    let trigger = parse(
        "BEGIN
           FOR r IN (SELECT id FROM t) LOOP
             IF DELETING THEN DELETE FROM u WHERE id = r.id; END IF;
           END LOOP;
           v := 1;
         END;",
    )
    .unwrap();

    assert_eq!(body(&specialize(&trigger, Operation::Insert)), vec![assign("v := 1")]);
    let delete = specialize(&trigger, Operation::Delete);
    assert_eq!(delete.body().len(), 2);
    assert_eq!(delete.body()[0].type_name(), "for_loop");
}

#[test]
fn test_nested_block_is_pruned() {
    let trigger = parse(
        "BEGIN
           BEGIN
             IF UPDATING THEN v := 1; END IF;
           END;
         END;",
    )
    .unwrap();

    assert!(specialize(&trigger, Operation::Insert).body().is_empty());
    let update = specialize(&trigger, Operation::Update);
    match update.body()[0].as_ref() {
        Statement::BeginEnd { body, .. } => assert_eq!(*body[0], assign("v := 1")),
        other => panic!("expected nested block, got {:?}", other),
    }
}

#[test]
fn test_unclassifiable_condition_is_kept_and_reported() {
    let trigger = parse("BEGIN IF flag = INSERTING THEN v := 1; END IF; END;").unwrap();
    let mut diags = Diagnostics::new();
    let specialized = specialize_with(&trigger, Operation::Update, &mut diags);
    assert_eq!(
        body(&specialized),
        vec![Statement::IfElse {
            branches: vec![Branch {
                condition: "flag = FALSE".to_string(),
                body: vec![Arc::new(assign("v := 1"))],
            }],
            else_body: Vec::new(),
        }]
    );
    assert_eq!(diags.len(), 1);
}

#[test]
fn test_predicates_in_expressions_become_constants() {
    let trigger = parse(
        "DECLARE
           v_first BOOLEAN := INSERTING;
         BEGIN
           v_op := CASE WHEN INSERTING THEN 'I' WHEN UPDATING THEN 'U' ELSE 'D' END;
           log_op(DELETING, UPDATING('STATUS'));
         END;",
    )
    .unwrap();

    let delete = specialize(&trigger, Operation::Delete);
    assert_eq!(
        body(&delete),
        vec![
            assign("v_op := CASE WHEN FALSE THEN 'I' WHEN FALSE THEN 'U' ELSE 'D' END"),
            Statement::FunctionCall {
                target: "log_op".to_string(),
                args: vec!["TRUE".to_string(), "FALSE".to_string()],
            },
        ]
    );
    assert_eq!(
        delete.declarations.variables[0].default_expr.as_deref(),
        Some("FALSE")
    );

    let update = specialize(&trigger, Operation::Update);
    assert_eq!(
        *update.body()[1],
        Statement::FunctionCall {
            target: "log_op".to_string(),
            args: vec!["FALSE".to_string(), "UPDATING('STATUS')".to_string()],
        }
    );
}

#[test]
fn test_handler_for_bound_exception_kept_around_dml() {
    let trigger = parse(
        "DECLARE
           fk_missing EXCEPTION;
           PRAGMA EXCEPTION_INIT(fk_missing, -2291);
         BEGIN
           INSERT INTO child (id) VALUES (:NEW.id);
         EXCEPTION
           WHEN fk_missing THEN
             IF INSERTING THEN v := 1; END IF;
         END;",
    )
    .unwrap();

    let update = specialize(&trigger, Operation::Update);
    assert_eq!(update.handlers().len(), 1);
    assert_eq!(update.handlers()[0].exception_name, "fk_missing");
    assert!(update.handlers()[0].body[0].is_noop());
}

#[test]
fn test_bound_exception_in_nested_block() {
    let trigger = parse(
        "BEGIN
           DECLARE
             dup EXCEPTION;
             PRAGMA EXCEPTION_INIT(dup, -1);
           BEGIN
             UPDATE t SET x = 1;
           EXCEPTION
             WHEN dup THEN IF DELETING THEN v := 1; END IF;
           END;
         END;",
    )
    .unwrap();

    let insert = specialize(&trigger, Operation::Insert);
    match insert.body()[0].as_ref() {
        Statement::BeginEnd { handlers, .. } => {
            assert_eq!(handlers.len(), 1);
            assert!(handlers[0].body[0].is_noop());
        }
        other => panic!("expected nested block, got {:?}", other),
    }
}

#[test]
fn test_no_data_found_handler_kept_around_function_call() {
    let trigger = parse(
        "BEGIN
           v := get_rate(:NEW.cd);
         EXCEPTION
           WHEN NO_DATA_FOUND THEN
             IF INSERTING THEN v := 0; END IF;
         END;",
    )
    .unwrap();

    let update = specialize(&trigger, Operation::Update);
    assert_eq!(update.handlers().len(), 1);
    assert!(update.handlers()[0].body[0].is_noop());

    // Plain arithmetic cannot raise it.
    let trigger = parse(
        "BEGIN
           v := v + 1;
         EXCEPTION
           WHEN NO_DATA_FOUND THEN
             IF INSERTING THEN v := 0; END IF;
         END;",
    )
    .unwrap();
    assert!(specialize(&trigger, Operation::Update).handlers().is_empty());
}

#[test]
fn test_exit_and_while_guards() {
    let trigger = parse(
        "BEGIN
           WHILE UPDATING LOOP
             v := v + 1;
             EXIT WHEN INSERTING OR v > 10;
           END LOOP;
         END;",
    )
    .unwrap();

    assert!(specialize(&trigger, Operation::Insert).body().is_empty());
    let update = specialize(&trigger, Operation::Update);
    assert_eq!(
        body(&update),
        vec![Statement::WhileLoop {
            condition: "TRUE".to_string(),
            body: vec![
                Arc::new(assign("v := v + 1")),
                Arc::new(Statement::Exit {
                    condition: Some("v > 10".to_string())
                }),
            ],
        }]
    );
}

#[test]
fn test_updating_column_guard() {
    let trigger = parse("BEGIN IF UPDATING('STATUS') THEN v := 1; END IF; END;").unwrap();
    assert!(specialize(&trigger, Operation::Insert).body().is_empty());
    assert_eq!(specialize(&trigger, Operation::Update), trigger);
}
