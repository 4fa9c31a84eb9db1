use strata::prelude::*;
use strata::{DatabaseStorage, DriverRegistry};

fn main() -> strata::Result<()> {
    let registry = DriverRegistry::with_defaults();
    let db = registry.open("sqlite3://:memory:")?;

    println!("=== Strata SQLite - Usage Example ===\n");
    println!("Platform: {} ({})\n", db.platform(), db.driver());

    db.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)",
        "",
        &[],
    )?;

    // One INSERT, compiled once and rebound for every row
    let mut insert = db
        .insert("users")
        .add_segment_ids(["name", "age"])
        .field("name", 's', Value::Null)
        .field("age", 'i', Value::Null);
    insert.compile();
    println!("1. Reused INSERT:");
    println!("   SQL: {}", insert.compiled_sql());
    for (name, age) in [("ann", 31), ("bob", 17), ("cy", 45)] {
        insert
            .set_segment_input("name", [name])
            .set_segment_input("age", [age])
            .execute()?;
    }

    // SELECT with an OR group
    let mut select = db
        .select("users")
        .fields(["name", "age"])
        .cond_group(
            db.condition("or")
                .cond_op("age", op::GT, 'i', 40)
                .cond_op("age", op::LT, 'i', 18),
        )
        .sort_asc("name");
    select.compile();
    println!("\n2. SELECT with condition group:");
    println!("   SQL: {}", select.compiled_sql());
    if let Some(mut rows) = select.enquire()? {
        while let Some(row) = rows.fetch_assoc(false) {
            println!("   {:?}", row);
        }
    }

    // Cache table in the same database
    let mut cache = DatabaseStorage::new(db.clone())?;
    cache.set("greeting", &"hello", 60)?;
    let greeting: Option<String> = cache.get("greeting")?;
    println!("\n3. Cache:");
    println!("   greeting = {:?}", greeting);

    cache.close();
    Ok(())
}
