// tests/statement_execution.rs
//
// Statement-level behavior through the public facade.

use quiverdb::core::config::Config;
use quiverdb::core::query::expression::{ArithOp, CompareOp, Expression};
use quiverdb::core::query::statements::{DeleteTarget, SelectStatement, Statement};
use quiverdb::core::schema::ClassKind;
use quiverdb::core::security::Permission;
use quiverdb::core::types::Value;
use quiverdb::{Quiver, QuiverError};
use std::collections::BTreeMap;

fn create_class(db: &Quiver, name: &str, kind: ClassKind) {
    db.execute(&Statement::CreateClass {
        name: name.to_string(),
        kind,
        is_abstract: false,
        superclass: None,
        clusters: 1,
        if_not_exists: false,
    })
    .expect("create class");
}

fn insert(db: &Quiver, class: &str, props: BTreeMap<String, Value>) {
    db.execute(&Statement::Insert { class: class.to_string(), properties: props })
        .expect("insert");
}

fn graph_db() -> Quiver {
    let db = Quiver::in_memory();
    create_class(&db, "Person", ClassKind::Vertex);
    create_class(&db, "Knows", ClassKind::Edge);
    create_class(&db, "Note", ClassKind::Document);
    db
}

#[test]
fn batched_delete_of_a_hundred_vertices_leaves_nothing_dangling() {
    let db = graph_db();
    let vertices: Vec<_> = (0..100)
        .map(|i| {
            let mut props = BTreeMap::new();
            props.insert("i".to_string(), Value::Integer(i));
            db.session().insert("Person", props).expect("vertex")
        })
        .collect();
    // a chain of edges so every delete patches a neighbor
    for pair in vertices.windows(2) {
        db.session().create_edge("Knows", pair[0], pair[1], BTreeMap::new()).expect("edge");
    }

    let mut results = db
        .execute(&Statement::DeleteVertex {
            target: DeleteTarget::Class("Person".to_string()),
            batch: Some(5),
        })
        .expect("delete");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows[0].property("count"), Some(&Value::Integer(100)));

    assert_eq!(db.session().count_class("Person").expect("count"), 0);
    assert_eq!(db.session().count_class("Knows").expect("count"), 0);
    assert!(!db.session().transaction_active());
}

#[test]
fn distinct_select_keeps_first_occurrence_order() {
    let db = graph_db();
    for _ in 0..5 {
        for name in ["foo", "bar"] {
            let mut props = BTreeMap::new();
            props.insert("name".to_string(), Value::from(name));
            insert(&db, "Note", props);
        }
    }
    let mut select = SelectStatement::from_class("Note");
    select.distinct = true;
    let mut results = db.execute(&Statement::Select(select)).expect("select");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].property("name"), Some(&Value::from("foo")));
    assert_eq!(rows[1].property("name"), Some(&Value::from("bar")));
}

#[test]
fn filtered_select_with_limit() {
    let db = graph_db();
    for i in 0..20 {
        let mut props = BTreeMap::new();
        props.insert("i".to_string(), Value::Integer(i));
        insert(&db, "Note", props);
    }
    let mut select = SelectStatement::from_class("Note");
    select.filter = Some(Expression::compare(
        Expression::property("i"),
        CompareOp::Ge,
        Expression::literal(Value::Integer(10)),
    ));
    select.limit = Some(3);
    let mut results = db.execute(&Statement::Select(select)).expect("select");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let Some(Value::Integer(i)) = row.property("i") else {
            panic!("missing i");
        };
        assert!(*i >= 10);
    }
}

#[test]
fn parallel_select_sees_every_cluster() {
    let db = graph_db();
    for _ in 0..7 {
        insert(&db, "Note", BTreeMap::new());
    }
    db.session()
        .with_schema_mut(|schema| schema.add_cluster("Note").map(|_| ()))
        .expect("add cluster");
    for _ in 0..2 {
        // inserts keep landing in the first cluster; the scan still covers both
        insert(&db, "Note", BTreeMap::new());
    }
    let mut select = SelectStatement::from_class("Note");
    select.parallel = true;
    let mut results = db.execute(&Statement::Select(select)).expect("select");
    assert_eq!(results.collect_rows().expect("rows").len(), 9);
}

#[test]
fn script_return_short_circuits_everything_after_it() {
    let db = graph_db();
    let script = vec![
        Statement::Let { name: "hits".to_string(), value: Expression::literal(Value::Integer(0)) },
        Statement::Foreach {
            variable: "i".to_string(),
            items: Expression::literal(Value::List((0..10).map(Value::Integer).collect())),
            body: vec![
                Statement::Let {
                    name: "hits".to_string(),
                    value: Expression::arith(
                        Expression::variable("hits"),
                        ArithOp::Add,
                        Expression::literal(Value::Integer(1)),
                    ),
                },
                Statement::If {
                    condition: Expression::compare(
                        Expression::variable("i"),
                        CompareOp::Eq,
                        Expression::literal(Value::Integer(4)),
                    ),
                    body: vec![Statement::Return(Expression::variable("hits"))],
                    else_body: Vec::new(),
                },
            ],
        },
        // must never run: would blow up on a missing class
        Statement::select("NoSuchClass"),
    ];
    let mut results = db.execute_script(&script).expect("script");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows[0].property("value"), Some(&Value::Integer(5)));
}

#[test]
fn explain_reports_the_plan_without_deleting() {
    let db = graph_db();
    insert(&db, "Note", BTreeMap::new());
    let mut results = db
        .execute(&Statement::Explain(Box::new(Statement::Delete {
            class: "Note".to_string(),
            filter: None,
            batch: None,
        })))
        .expect("explain");
    let rows = results.collect_rows().expect("rows");
    let Some(Value::String(plan)) = rows[0].property("plan") else {
        panic!("missing plan");
    };
    assert!(plan.contains("FETCH FROM CLASS Note"));
    assert!(plan.contains("CHECK SAFE DELETE"));
    assert_eq!(db.session().count_class("Note").expect("count"), 1);
}

#[test]
fn profile_executes_and_annotates_timing() {
    let db = graph_db();
    for _ in 0..10 {
        insert(&db, "Note", BTreeMap::new());
    }
    let mut results = db
        .execute(&Statement::Profile(Box::new(Statement::select("Note"))))
        .expect("profile");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows[0].property("rows"), Some(&Value::Integer(10)));
    let Some(Value::String(report)) = rows[0].property("profile") else {
        panic!("missing report");
    };
    assert!(report.contains("FETCH FROM CLASS Note"));
    assert!(report.contains("ns") || report.contains("µs") || report.contains("ms"));
}

#[test]
fn profile_of_a_parallel_select_reports_every_branch() {
    let db = graph_db();
    db.session()
        .with_schema_mut(|schema| schema.add_cluster("Note").map(|_| ()))
        .expect("add cluster");
    for _ in 0..4 {
        insert(&db, "Note", BTreeMap::new());
    }
    let mut select = SelectStatement::from_class("Note");
    select.parallel = true;
    let mut results = db
        .execute(&Statement::Profile(Box::new(Statement::Select(select))))
        .expect("profile");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows[0].property("rows"), Some(&Value::Integer(4)));
    let Some(Value::String(report)) = rows[0].property("profile") else {
        panic!("missing report");
    };
    assert!(report.contains("PARALLEL EXEC (2 sub-plans)"));
    assert!(report.contains("[branch 0]"));
    assert!(report.contains("[branch 1]"));
}

#[test]
fn transaction_statements_report_and_apply() {
    let db = graph_db();
    db.execute(&Statement::Begin).expect("begin");
    insert(&db, "Note", BTreeMap::new());
    assert!(matches!(
        db.execute(&Statement::Begin),
        Err(QuiverError::InvalidState(_))
    ));
    let mut results = db.execute(&Statement::Rollback).expect("rollback");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows[0].property("operation"), Some(&Value::from("rollback")));
    assert_eq!(db.session().count_class("Note").expect("count"), 0);
}

#[test]
fn delete_edge_by_subquery_rows() {
    let db = graph_db();
    let a = db.session().insert("Person", BTreeMap::new()).expect("a");
    let b = db.session().insert("Person", BTreeMap::new()).expect("b");
    db.session().create_edge("Knows", a, b, BTreeMap::new()).expect("edge");

    let mut results = db
        .execute(&Statement::DeleteEdge {
            target: DeleteTarget::Subquery(Box::new(Statement::select("Knows"))),
            batch: None,
        })
        .expect("delete");
    let rows = results.collect_rows().expect("rows");
    assert_eq!(rows[0].property("count"), Some(&Value::Integer(1)));
    assert_eq!(db.session().count_class("Knows").expect("count"), 0);
    let a_rec = db.session().fetch(a).expect("fetch").expect("a");
    assert!(a_rec.out_edges.is_empty());
}

#[test]
fn security_statements_round_trip() {
    let db = Quiver::in_memory();
    db.execute(&Statement::Grant {
        permission: Permission::Read,
        resource: "database.class.Person".to_string(),
        role: "reader".to_string(),
    })
    .expect("grant");
    let allowed = db
        .session()
        .with_security(|s| Ok(s.is_allowed("reader", "database.class.Person", Permission::Read)))
        .expect("check");
    assert!(allowed);

    db.execute(&Statement::Revoke {
        permission: Permission::Read,
        resource: "database.class.Person".to_string(),
        role: "reader".to_string(),
    })
    .expect("revoke");
    let allowed = db
        .session()
        .with_security(|s| Ok(s.is_allowed("reader", "database.class.Person", Permission::Read)))
        .expect("check");
    assert!(!allowed);
}

#[test]
fn scan_timeout_is_a_reported_error() {
    let db = Quiver::with_config(Config::builder().query_timeout_ms(1).build());
    create_class(&db, "Note", ClassKind::Document);
    for _ in 0..1_000 {
        db.session().insert("Note", BTreeMap::new()).expect("insert");
    }
    // the scan is lazy and the deadline is fixed when the statement starts,
    // so pulling rows only after the budget has elapsed must fail
    let mut results = db.execute(&Statement::select("Note")).expect("start");
    std::thread::sleep(std::time::Duration::from_millis(10));
    let outcome = results.collect_rows();
    assert!(matches!(outcome, Err(QuiverError::Timeout(_))));
}
