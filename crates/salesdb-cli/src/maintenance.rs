//! Maintenance command handlers: duplicate keys, data repairs, run history.

use chrono::NaiveDate;
use clap::Subcommand;
use salesdb_core::{ReportTable, StoreId};

/// Sub-commands available under `repair`.
#[derive(Debug, Subcommand)]
pub enum RepairCommands {
    /// Flip negative gift-card sales to positive (preview unless --apply)
    GiftCardSign {
        /// First business date to repair
        #[arg(long)]
        from: NaiveDate,
        /// Last business date to repair (inclusive)
        #[arg(long)]
        to: NaiveDate,
        /// Restrict the repair to one store code
        #[arg(long)]
        store: Option<String>,
        /// Write the repair instead of previewing it
        #[arg(long, requires_all = ["operator", "reason"])]
        apply: bool,
        /// Who is applying the repair (recorded in the audit trail)
        #[arg(long)]
        operator: Option<String>,
        /// Why the repair is being applied (recorded in the audit trail)
        #[arg(long)]
        reason: Option<String>,
    },
}

/// Report duplicate natural keys in `table`, deleting older copies when
/// `resolve` is set.
pub(crate) async fn run_dedupe(
    pool: &sqlx::PgPool,
    table: ReportTable,
    resolve: bool,
) -> anyhow::Result<()> {
    let duplicates = salesdb_db::find_duplicates(pool, table).await?;
    if duplicates.is_empty() {
        println!("{table}: no duplicate keys");
        return Ok(());
    }

    println!("{table}: {} duplicated keys", duplicates.len());
    for dup in &duplicates {
        println!(
            "  {}  copies={}  keep id={}",
            dup.natural_key(),
            dup.copies,
            dup.keep_id
        );
    }

    if resolve {
        let deleted = salesdb_db::resolve_duplicates(pool, table).await?;
        println!("{table}: deleted {deleted} older rows");
    } else {
        println!("re-run with --resolve to keep the newest row per key");
    }
    Ok(())
}

pub(crate) async fn run_repair(pool: &sqlx::PgPool, command: RepairCommands) -> anyhow::Result<()> {
    match command {
        RepairCommands::GiftCardSign {
            from,
            to,
            store,
            apply,
            operator,
            reason,
        } => {
            let store = store.map(StoreId::new);
            if apply {
                let (Some(operator), Some(reason)) = (operator, reason) else {
                    anyhow::bail!("--apply requires --operator and --reason");
                };
                let rows = salesdb_db::apply_gift_card_sign_repair(
                    pool,
                    from,
                    to,
                    store.as_ref(),
                    &operator,
                    &reason,
                )
                .await?;
                print_gift_card_rows(&rows);
                println!("repaired {} rows", rows.len());
            } else {
                let rows =
                    salesdb_db::preview_gift_card_sign_repair(pool, from, to, store.as_ref())
                        .await?;
                print_gift_card_rows(&rows);
                println!(
                    "preview: {} rows would change; re-run with --apply --operator NAME --reason TEXT",
                    rows.len()
                );
            }
            Ok(())
        }
    }
}

fn print_gift_card_rows(rows: &[salesdb_db::GiftCardRepairRow]) {
    for row in rows {
        println!(
            "  id={}  store={}  date={}  gift_card_sales={}",
            row.id, row.store_id, row.business_date, row.gift_card_sales
        );
    }
}

pub(crate) async fn run_list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = salesdb_db::list_ingest_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no ingest runs recorded");
        return Ok(());
    }

    for run in &runs {
        let finished = run
            .completed_at
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        let counts = match run.run_summary()? {
            Some(summary) => format!(
                "files={}/{} upserted={} failed_batches={}",
                summary.files_processed,
                run.files_total,
                summary.rows_upserted,
                summary.failed_batches
            ),
            None => format!("files=?/{}", run.files_total),
        };
        println!(
            "{}  {:<9}  {}  finished={}  {}",
            run.public_id, run.status, run.strategy, finished, counts
        );
        if let Some(message) = &run.error_message {
            println!("    error: {message}");
        }
    }
    Ok(())
}
