//! Order processing: stage line defaults, write them in one batch, then run
//! the base state transition.

use entrega_core::DomainResult;

use crate::extension::{BatchWrite, LineWriter, SaleExtensions, date_update};
use crate::order::Sale;

/// Stage every default-value proposal across the batch of sales, in
/// (sale, line) traversal order. Identical payloads share a group.
pub fn stage_line_defaults(sales: &[Sale], extensions: &SaleExtensions) -> BatchWrite {
    let mut batch = BatchWrite::new();
    for sale in sales {
        for line in sale.lines() {
            for provider in extensions.line_date_defaults() {
                if let Some(date) = provider.propose(line) {
                    batch.stage(line.id, date_update(provider.field(), Some(date)));
                }
            }
        }
    }
    batch
}

/// The base half of processing: fold the staged writes back into the
/// in-memory sales, then transition each sale to processing.
pub fn apply_and_transition(sales: &mut [Sale], batch: &BatchWrite) -> DomainResult<()> {
    for sale in sales.iter_mut() {
        sale.apply_batch(batch)?;
        sale.start_processing()?;
    }
    Ok(())
}

/// Process a batch of sales: stage defaults for every line that wants one,
/// apply them through the batch write API in a single call, then delegate to
/// the base transition. Running this twice over the same batch is a no-op
/// the second time around: populated fields are never proposed for again.
pub fn process(
    sales: &mut [Sale],
    extensions: &SaleExtensions,
    writer: &mut dyn LineWriter,
) -> DomainResult<()> {
    let batch = stage_line_defaults(sales, extensions);
    if !batch.is_empty() {
        writer.write(&batch)?;
    }
    apply_and_transition(sales, &batch)
}
