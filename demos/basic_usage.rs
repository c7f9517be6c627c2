//! # file-table-engine 使用案例
//!
//! 1. 写出一个行文件（点数据）
//! 2. 以外部表方式链接进 Database
//! 3. 创建空间索引（批量构建 + 进度日志）
//! 4. 空间查询、按行键取行
//! 5. 演示只读约束与不支持的索引类型
//! 6. 删除表

use std::fs::File;
use std::sync::Arc;

use file_table_engine::{
    catalog::Database,
    common::TableConfig,
    driver::{RowFileDriver, RowFileWriter},
    field_type::{Column, ColumnType, Value},
    geometry::Envelope,
    index::IndexType,
};

fn main() -> file_table_engine::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    // =========================================================================
    // 1. 写出行文件
    // =========================================================================
    let path = std::env::temp_dir().join("file-table-demo.rows");
    println!("【1】写出行文件 {} ...", path.display());
    let columns = vec![
        Column::new("ID",       ColumnType::Int64),
        Column::new("NAME",     ColumnType::Varchar),
        Column::new("THE_GEOM", ColumnType::Geometry),
    ];
    let mut writer = RowFileWriter::new(File::create(&path)?, columns)?;
    for i in 0..5_000i64 {
        let (x, y) = ((i % 100) as f64, (i / 100) as f64);
        writer.append_row(&[
            Value::Int64(i),
            Value::from(format!("poi-{i}").as_str()),
            Value::Geometry(Envelope::point(x, y)),
        ])?;
    }
    let bytes = writer.finish()?;
    println!("    ✓ {bytes} bytes\n");

    // =========================================================================
    // 2. 链接外部表
    // =========================================================================
    println!("【2】链接外部表 `POI` ...");
    let mut db = Database::new(
        TableConfig::default().with_max_memory_rows(1_000).with_progress_interval(1_000),
    );
    db.link_table("POI", Arc::new(RowFileDriver::open(&path)?))?;
    let table = db.table("POI")?;
    println!("    rows       = {}", table.row_count());
    println!("    table_type = {}", table.table_type().as_str());
    for idx in table.indexes() {
        println!("    index      = {} ({:?})", idx.name(), idx.kind());
    }
    println!();

    // =========================================================================
    // 3. 创建空间索引
    // =========================================================================
    println!("【3】创建空间索引 ...");
    let name = db.create_spatial_index("POI", "THE_GEOM")?;
    println!("    ✓ {name}\n");

    // =========================================================================
    // 4. 查询
    // =========================================================================
    println!("【4】空间查询 x∈[10,12] y∈[3,4] ...");
    let table = db.table("POI")?;
    if let Some(index) = table.index(&name) {
        for key in index.find_intersecting(&Envelope::new(10.0, 3.0, 12.0, 4.0))? {
            let row = table.get_row(key)?;
            println!("    key={key:<5} {}", row.values[1]);
        }
        println!("    index rows = {}", index.row_count());
    }
    println!();

    // =========================================================================
    // 5. 只读约束
    // =========================================================================
    println!("【5】只读约束 ...");
    let row = db.table("POI")?.get_row(1)?;
    if let Err(e) = db.table_mut("POI")?.add_row(&row) {
        println!("    addRow      → {e}");
    }
    if let Err(e) = db.create_index("POI", None, &["ID"], IndexType::Btree, None) {
        println!("    BTREE index → {e}");
    }
    println!();

    // =========================================================================
    // 6. 删除表
    // =========================================================================
    println!("【6】删除表 ...");
    db.drop_table("POI")?;
    std::fs::remove_file(&path)?;
    println!("    ✓ OK");
    Ok(())
}
