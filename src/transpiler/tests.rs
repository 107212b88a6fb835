use super::*;
use crate::diagnostics::{Diagnostics, Severity};
use crate::mapping::MappingTables;
use crate::parser::parse;
use crate::specializer::specialize;
use pretty_assertions::assert_eq;

fn postgres(src: &str, op: Operation) -> (String, Diagnostics) {
    let trigger = specialize(&parse(src).unwrap(), op);
    let tables = MappingTables::builtin();
    let mut diags = Diagnostics::new();
    let text = to_postgres(&trigger, &tables, &GenerateOptions::default(), &mut diags);
    (text, diags)
}

fn postgres_unspecialized(src: &str) -> (String, Diagnostics) {
    let trigger = parse(src).unwrap();
    let tables = MappingTables::builtin();
    let mut diags = Diagnostics::new();
    let text = to_postgres(&trigger, &tables, &GenerateOptions::default(), &mut diags);
    (text, diags)
}

const THEME_TRIGGER: &str = "
    BEGIN
      IF (INSERTING) THEN
        :NEW.code := SUBSTR(:NEW.name, 1, 2);
      END IF;
      IF :NEW.theme_no > 99 THEN
        RAISE_APPLICATION_ERROR(-20101, 'Invalid theme number');
      END IF;
    END;";

#[test]
fn test_do_block_for_insert() {
    let (text, diags) = postgres(THEME_TRIGGER, Operation::Insert);
    assert_eq!(
        text,
        "DO $$
BEGIN
    :new_code := SUBSTRING(:new_name FROM 1 FOR 2);
    IF :new_theme_no > 99 THEN
        RAISE EXCEPTION 'Invalid theme number';
    END IF;
END $$;
"
    );
    assert!(diags.is_empty());
}

#[test]
fn test_do_block_for_update_drops_insert_branch() {
    let (text, _) = postgres(THEME_TRIGGER, Operation::Update);
    assert_eq!(
        text,
        "DO $$
BEGIN
    IF :new_theme_no > 99 THEN
        RAISE EXCEPTION 'Invalid theme number';
    END IF;
END $$;
"
    );
}

#[test]
fn test_error_code_retained_as_comment() {
    let trigger = parse("BEGIN RAISE_APPLICATION_ERROR(-20101, 'Bad'); END;").unwrap();
    let options = GenerateOptions {
        retain_error_code: true,
        ..GenerateOptions::default()
    };
    let mut diags = Diagnostics::new();
    let text = to_postgres(&trigger, &MappingTables::builtin(), &options, &mut diags);
    assert!(text.contains("RAISE EXCEPTION 'Bad'; -- error code -20101"));
}

#[test]
fn test_non_literal_application_error_message() {
    let (text, _) =
        postgres_unspecialized("BEGIN RAISE_APPLICATION_ERROR(-20001, 'Bad: ' || :NEW.id); END;");
    assert!(text.contains("RAISE EXCEPTION '%', 'Bad: ' || :new_id;"));
}

#[test]
fn test_declarations_and_loop_records() {
    let (text, diags) = postgres_unspecialized(
        "DECLARE
           v_count NUMBER(10) := 0;
           v_name  VARCHAR2(30 BYTE);
           c_max   CONSTANT NUMBER := 5;
           e_bad   EXCEPTION;
           CURSOR c_t IS SELECT id FROM t WHERE d < SYSDATE;
         BEGIN
           FOR r IN c_t LOOP
             v_count := v_count + 1;
           END LOOP;
           FOR i IN 1..3 LOOP
             NULL;
           END LOOP;
         END;",
    );
    assert_eq!(
        text,
        "DO $$
DECLARE
    c_max CONSTANT NUMERIC := 5;
    v_count NUMERIC(10) := 0;
    v_name VARCHAR(30);
    c_t CURSOR FOR SELECT id FROM t WHERE d < CURRENT_TIMESTAMP;
    r RECORD;
BEGIN
    FOR r IN c_t LOOP
        v_count := v_count + 1;
    END LOOP;
    FOR i IN 1..3 LOOP
        NULL;
    END LOOP;
END $$;
"
    );
    assert!(diags.is_empty());
}

#[test]
fn test_query_loop_loses_outer_parentheses() {
    let (text, _) =
        postgres_unspecialized("BEGIN FOR rec IN (SELECT id FROM t) LOOP NULL; END LOOP; END;");
    assert!(text.contains("    rec RECORD;\n"));
    assert!(text.contains("    FOR rec IN SELECT id FROM t LOOP\n"));
}

#[test]
fn test_handler_conditions() {
    let (text, diags) = postgres_unspecialized(
        "DECLARE e_bad EXCEPTION;
         BEGIN
           SELECT x INTO v FROM t;
         EXCEPTION
           WHEN NO_DATA_FOUND THEN v := 0;
           WHEN e_bad THEN NULL;
           WHEN LOGIN_DENIED THEN NULL;
           WHEN OTHERS THEN RAISE;
         END;",
    );
    assert_eq!(
        text,
        "DO $$
BEGIN
    SELECT x INTO v FROM t;
EXCEPTION
    WHEN no_data_found THEN
        v := 0;
    WHEN SQLSTATE 'UE001' THEN
        NULL;
    WHEN OTHERS THEN
        NULL;
    WHEN OTHERS THEN
        RAISE;
END $$;
"
    );
    assert_eq!(diags.count(Severity::Warning), 1);
    // LOGIN_DENIED widened to OTHERS hides the real OTHERS handler.
    assert_eq!(diags.count(Severity::Error), 1);
}

#[test]
fn test_each_user_exception_has_its_own_errcode() {
    let (text, diags) = postgres_unspecialized(
        "DECLARE
           e1 EXCEPTION;
           e2 EXCEPTION;
         BEGIN
           RAISE e2;
         EXCEPTION
           WHEN e1 THEN x := 1;
           WHEN e2 THEN x := 2;
         END;",
    );
    assert!(text.contains("    RAISE EXCEPTION 'e2' USING ERRCODE = 'UE002';\n"));
    assert!(text.contains("    WHEN SQLSTATE 'UE001' THEN\n        x := 1;\n"));
    assert!(text.contains("    WHEN SQLSTATE 'UE002' THEN\n        x := 2;\n"));
    assert!(diags.is_empty());
}

#[test]
fn test_bound_exceptions_use_matching_codes() {
    let (text, _) = postgres_unspecialized(
        "DECLARE
           fk_missing EXCEPTION;
           PRAGMA EXCEPTION_INIT(fk_missing, -2291);
           e_limit EXCEPTION;
           PRAGMA EXCEPTION_INIT(e_limit, -20001);
         BEGIN
           INSERT INTO child (id) VALUES (:NEW.id);
           RAISE_APPLICATION_ERROR(-20001, 'Limit reached');
         EXCEPTION
           WHEN fk_missing THEN NULL;
           WHEN e_limit THEN RAISE;
         END;",
    );
    assert!(text.contains("RAISE EXCEPTION 'Limit reached' USING ERRCODE = 'UA001';"));
    assert!(text.contains("WHEN foreign_key_violation THEN"));
    assert!(text.contains("WHEN SQLSTATE 'UA001' THEN"));
}

#[test]
fn test_exceptions_of_nested_blocks_get_codes() {
    let (text, _) = postgres_unspecialized(
        "BEGIN
           DECLARE
             e_inner EXCEPTION;
           BEGIN
             RAISE e_inner;
           EXCEPTION
             WHEN e_inner THEN NULL;
           END;
         END;",
    );
    assert!(text.contains("RAISE EXCEPTION 'e_inner' USING ERRCODE = 'UE001';"));
    assert!(text.contains("WHEN SQLSTATE 'UE001' THEN"));
}

#[test]
fn test_duplicate_handler_condition_is_reported() {
    let (_, diags) = postgres_unspecialized(
        "BEGIN
           SELECT x INTO v FROM t;
         EXCEPTION
           WHEN DUP_VAL_ON_INDEX THEN v := 1;
           WHEN NO_DATA_FOUND THEN v := 2;
           WHEN OTHERS THEN NULL;
         END;",
    );
    assert_eq!(diags.count(Severity::Error), 0);

    let (_, diags) = postgres_unspecialized(
        "DECLARE
           dup EXCEPTION;
           PRAGMA EXCEPTION_INIT(dup, -1);
         BEGIN
           UPDATE t SET x = 1;
         EXCEPTION
           WHEN DUP_VAL_ON_INDEX THEN v := 1;
           WHEN dup THEN v := 2;
         END;",
    );
    assert_eq!(diags.count(Severity::Error), 1);
}

#[test]
fn test_user_exception_raise_uses_message_table() {
    let (text, _) = postgres_unspecialized(
        "DECLARE bad_theme EXCEPTION;
         BEGIN
           IF :NEW.x IS NULL THEN RAISE bad_theme; END IF;
           RAISE NO_DATA_FOUND;
         END;",
    );
    assert!(text.contains("RAISE EXCEPTION 'bad_theme' USING ERRCODE = 'UE001';"));
    // A predefined exception is raised with the code its handler catches.
    assert!(text.contains("RAISE EXCEPTION 'No data found' USING ERRCODE = 'no_data_found';"));
}

#[test]
fn test_calls_and_output() {
    let (text, diags) = postgres_unspecialized(
        "BEGIN
           DBMS_OUTPUT.PUT_LINE('changed ' || :OLD.id);
           audit_pkg.log_change(:NEW.id, USER);
         END;",
    );
    assert!(text.contains("RAISE NOTICE '%', 'changed ' || :old_id;"));
    assert!(text.contains("PERFORM audit_pkg.log_change(:new_id, CURRENT_USER);"));
    // The package procedure has no mapping.
    assert_eq!(diags.count(Severity::Warning), 1);
}

#[test]
fn test_unsupported_constructs_become_placeholders() {
    let (text, diags) = postgres_unspecialized(
        "DECLARE
           TYPE t_ids IS TABLE OF NUMBER;
         BEGIN
           GOTO done;
           <<done>>
           NULL;
         END;",
    );
    assert!(text.contains("-- UNSUPPORTED declaration: TYPE t_ids IS TABLE OF NUMBER"));
    assert!(text.contains("-- UNSUPPORTED GOTO: done"));
    assert!(text.contains("<<done>>"));
    assert_eq!(diags.count(Severity::Error), 2);
}

#[test]
fn test_unmapped_type_and_function_warn_per_occurrence() {
    let (text, diags) = postgres_unspecialized(
        "DECLARE
           g SDO_GEOMETRY;
         BEGIN
           v := geo_len(g) + geo_len(g);
         END;",
    );
    assert!(text.contains("g SDO_GEOMETRY;"));
    assert!(text.contains("v := geo_len(g) + geo_len(g);"));
    assert_eq!(diags.count(Severity::Warning), 3);
}

#[test]
fn test_mixed_condition_left_in_tg_op_form() {
    let src = "BEGIN IF INSERTING OR :NEW.flag = 'Y' THEN v := 1; END IF; END;";
    let (text, _) = postgres_unspecialized(src);
    assert!(text.contains("IF TG_OP = 'INSERT' OR :new_flag = 'Y' THEN"));
}

#[test]
fn test_literal_forms_in_generated_code() {
    let (text, diags) = postgres_unspecialized("BEGIN v := 1.5E3 + 2e-1; w := q'[it's]'; END;");
    assert!(text.contains("    v := 1.5E3 + 2e-1;\n"));
    assert!(text.contains("    w := 'it''s';\n"));
    assert!(diags.is_empty());
}

#[test]
fn test_indent_width_option() {
    let trigger = parse("BEGIN IF a = 1 THEN v := 1; END IF; END;").unwrap();
    let options = GenerateOptions {
        indent: 2,
        ..GenerateOptions::default()
    };
    let mut diags = Diagnostics::new();
    let text = to_postgres(&trigger, &MappingTables::builtin(), &options, &mut diags);
    assert_eq!(
        text,
        "DO $$\nBEGIN\n  IF a = 1 THEN\n    v := 1;\n  END IF;\nEND $$;\n"
    );
}

#[test]
fn test_writer_indentation() {
    let mut writer = Writer::new(4);
    writer.line("BEGIN").unwrap();
    writer.indent();
    writer.line("NULL;").unwrap();
    writer.dedent();
    writer.dedent();
    writer.line("END;").unwrap();
    assert_eq!(writer.finish(), "BEGIN\n    NULL;\nEND;\n");
}

#[test]
fn test_numeric_range_detection() {
    assert!(is_numeric_range("1..10"));
    assert!(is_numeric_range("1..v_count"));
    assert!(!is_numeric_range("(SELECT id FROM t)"));
    assert!(!is_numeric_range("c_emp"));
}

const ROUND_TRIP_TRIGGER: &str = "
    CREATE OR REPLACE TRIGGER trg_orders
      AFTER INSERT OR UPDATE OR DELETE ON orders
      FOR EACH ROW
    DECLARE
      v_total  NUMBER(12, 2) := 0;
      v_flag   CHAR(1) NOT NULL := 'N';
      c_limit  CONSTANT PLS_INTEGER := 10;
      e_limit  EXCEPTION;
      PRAGMA EXCEPTION_INIT(e_limit, -20001);
      CURSOR c_lines IS SELECT amount FROM order_lines WHERE order_id = :NEW.id;
      TYPE t_ids IS TABLE OF NUMBER;
    BEGIN
      IF INSERTING THEN
        v_flag := 'I';
      ELSIF UPDATING('STATUS') AND :NEW.status = 'X' THEN
        v_flag := 'U';
      ELSE
        v_flag := 'D';
      END IF;
      CASE v_flag
        WHEN 'I' THEN v_total := NVL(:NEW.amount, 0);
        ELSE NULL;
      END CASE;
      FOR l IN c_lines LOOP
        v_total := v_total + l.amount;
        EXIT WHEN v_total > c_limit;
      END LOOP;
      <<retry>>
      WHILE v_total > 0 LOOP
        v_total := v_total - 1;
      END LOOP;
      BEGIN
        INSERT INTO order_audit (id, at) VALUES (:NEW.id, SYSDATE);
      EXCEPTION
        WHEN DUP_VAL_ON_INDEX OR e_limit THEN NULL;
      END;
      audit_pkg.touch;
      raise_application_error(-20001, 'Limit ' || c_limit);
    EXCEPTION
      WHEN NO_DATA_FOUND THEN RAISE e_limit;
      WHEN OTHERS THEN RAISE;
    END;
    /";

#[test]
fn test_oracle_round_trip() {
    let trigger = parse(ROUND_TRIP_TRIGGER).unwrap();
    let rendered = to_oracle(&trigger);
    let reparsed = parse(&rendered).unwrap();
    assert_eq!(reparsed, trigger);
    // Rendering is canonical: a second pass is byte-identical.
    assert_eq!(to_oracle(&reparsed), rendered);
}

#[test]
fn test_oracle_rendering_shape() {
    let trigger = parse("BEGIN IF a = 1 THEN v := 1; ELSE NULL; END IF; END;").unwrap();
    assert_eq!(
        to_oracle(&trigger),
        "BEGIN\n    IF a = 1 THEN\n        v := 1;\n    ELSE\n        NULL;\n    END IF;\nEND;\n"
    );
}

#[test]
fn test_dialect_dispatch() {
    let trigger = parse("BEGIN v := SYSDATE; END;").unwrap();
    let tables = MappingTables::builtin();
    let options = GenerateOptions::default();
    let mut diags = Diagnostics::new();

    let dialect: Dialect = "pg".parse().unwrap();
    assert_eq!(dialect, Dialect::Postgres);
    let text = dialect.render(&trigger, &tables, &options, &mut diags);
    assert!(text.contains("v := CURRENT_TIMESTAMP;"));

    let text = Dialect::Oracle.render(&trigger, &tables, &options, &mut diags);
    assert_eq!(text, "BEGIN\n    v := SYSDATE;\nEND;\n");
    assert!("db2".parse::<Dialect>().is_err());
}
