use std::io;
use std::path::Path;

use anyhow::Context;

use crate::models::ScoreTable;

pub fn write_csv<W: io::Write>(table: &ScoreTable, writer: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&table.headers)?;

    for row in &table.rows {
        let mut record = vec![row.student_id.clone(), row.student_name.clone()];
        record.extend(row.scores.iter().map(|score| score.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn export_csv(table: &ScoreTable, path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(table, file).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(table.rows.len())
}
