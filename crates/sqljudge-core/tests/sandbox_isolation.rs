use sqljudge_core::errors::ExecutionError;
use sqljudge_core::model::Cell;
use sqljudge_core::sandbox::{ExecutionRequest, Sandbox, SandboxLimits, StatementKind};

const SETUP: &str = "CREATE TABLE t(x INT); INSERT INTO t VALUES (1);";

const SEED_2000: &str = "CREATE TABLE t(x INT);
INSERT INTO t
  WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 2000)
  SELECT x FROM n;";

#[test]
fn test_each_call_sees_only_its_own_setup() -> anyhow::Result<()> {
    let sandbox = Sandbox::default();

    for _ in 0..2 {
        let mut req = ExecutionRequest::new(SETUP, "INSERT INTO t VALUES (2)", 1000);
        req.inspect_table = Some("t");
        let out = sandbox.run(&req)?;
        assert_eq!(out.kind, StatementKind::Command);
        assert_eq!(out.rows.len(), 2, "setup row plus this call's insert only");
    }

    let out = sandbox.execute(SETUP, "SELECT COUNT(*) AS n FROM t", 1000)?;
    assert_eq!(out.rows[0].get("n"), Some(&Cell::Integer(1)));
    assert_eq!(sandbox.live_instances(), 0);
    Ok(())
}

#[test]
fn test_concurrent_calls_are_independent() -> anyhow::Result<()> {
    let sandbox = Sandbox::default();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sandbox = sandbox.clone();
            std::thread::spawn(move || {
                let insert = format!("INSERT INTO t VALUES ({})", i + 10);
                let mut req = ExecutionRequest::new(SETUP, &insert, 1000);
                req.inspect_table = Some("t");
                sandbox.run(&req).map(|o| o.rows.len())
            })
        })
        .collect();

    for h in handles {
        let rows = h.join().map_err(|_| anyhow::anyhow!("worker panicked"))??;
        assert_eq!(rows, 2);
    }
    assert_eq!(sandbox.live_instances(), 0);
    Ok(())
}

#[test]
fn test_row_cap_is_applied() -> anyhow::Result<()> {
    let sandbox = Sandbox::default();

    let out = sandbox.execute(SEED_2000, "SELECT * FROM t", 1000)?;
    assert_eq!(out.kind, StatementKind::Query);
    assert_eq!(out.rows.len(), 1000);

    // a user LIMIT above the cap is still capped while fetching
    let out = sandbox.execute(SEED_2000, "SELECT * FROM t LIMIT 5000;", 1000)?;
    assert_eq!(out.rows.len(), 1000);

    let out = sandbox.execute(SEED_2000, "select * from t limit 3", 1000)?;
    assert_eq!(out.rows.len(), 3);
    Ok(())
}

#[test]
fn test_runaway_query_hits_deadline() {
    let sandbox = Sandbox::new(SandboxLimits {
        deadline_ms: 200,
        ..Default::default()
    });

    let err = sandbox
        .execute(
            "",
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT COUNT(*) FROM c",
            1000,
        )
        .unwrap_err();

    assert_eq!(err, ExecutionError::DeadlineExceeded { limit_ms: 200 });
    assert!(err.to_string().contains("200 ms"));
    assert_eq!(sandbox.live_instances(), 0);
}

#[test]
fn test_runaway_command_hits_deadline() {
    let sandbox = Sandbox::new(SandboxLimits {
        deadline_ms: 200,
        ..Default::default()
    });

    let err = sandbox
        .execute(
            "CREATE TABLE t(x INT);",
            "INSERT INTO t WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT x FROM c",
            1000,
        )
        .unwrap_err();

    assert_eq!(err, ExecutionError::DeadlineExceeded { limit_ms: 200 });
    assert_eq!(sandbox.live_instances(), 0);
}

#[test]
fn test_runaway_follow_up_hits_deadline() {
    let sandbox = Sandbox::new(SandboxLimits {
        deadline_ms: 200,
        ..Default::default()
    });

    let mut req = ExecutionRequest::new(SETUP, "INSERT INTO t VALUES (2)", 1000);
    req.follow_up_sql = Some(
        "INSERT INTO t WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT x FROM c;",
    );
    req.inspect_table = Some("t");

    let err = sandbox.run(&req).unwrap_err();
    assert_eq!(err, ExecutionError::DeadlineExceeded { limit_ms: 200 });
    assert_eq!(sandbox.live_instances(), 0);
}

#[test]
fn test_errors_carry_engine_message_and_release_instance() {
    let sandbox = Sandbox::default();

    let err = sandbox
        .execute(SETUP, "SELECT * FROM nonexistent", 1000)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Statement(_)));
    assert!(err.to_string().contains("no such table: nonexistent"));

    let err = sandbox
        .execute("CREATE TABLE broken(", "SELECT 1", 1000)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Setup(_)));

    assert_eq!(sandbox.live_instances(), 0);
}

#[test]
fn test_attach_is_blocked_by_the_engine() {
    let sandbox = Sandbox::default();
    let res = sandbox.execute("", "ATTACH DATABASE ':memory:' AS other", 1000);
    assert!(res.is_err());
}

#[test]
fn test_follow_up_runs_in_same_instance() -> anyhow::Result<()> {
    let sandbox = Sandbox::default();
    let setup = "CREATE TABLE accounts(id INT, balance INT);
                 CREATE TABLE audit(account_id INT, delta INT);
                 INSERT INTO accounts VALUES (1, 100);";
    let trigger = "CREATE TRIGGER log_update AFTER UPDATE ON accounts BEGIN
                     INSERT INTO audit VALUES (NEW.id, NEW.balance - OLD.balance);
                   END";

    let mut req = ExecutionRequest::new(setup, trigger, 1000);
    req.follow_up_sql = Some("UPDATE accounts SET balance = 70 WHERE id = 1;");
    req.inspect_table = Some("audit");
    let out = sandbox.run(&req)?;

    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].get("delta"), Some(&Cell::Integer(-30)));

    req.follow_up_sql = Some("INSERT INTO missing VALUES (1);");
    let err = sandbox.run(&req).unwrap_err();
    assert!(matches!(err, ExecutionError::FollowUp(_)));
    Ok(())
}

#[test]
fn test_describe_schema_lists_tables_in_creation_order() -> anyhow::Result<()> {
    let sandbox = Sandbox::default();
    let tables = sandbox.describe_schema(
        "CREATE TABLE employees(id INT, name TEXT, salary INT);
         CREATE TABLE departments(id INT, title TEXT);",
    )?;

    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["employees", "departments"]);
    assert_eq!(tables[0].columns, vec!["id", "name", "salary"]);
    Ok(())
}
