use crate::einvoice::InvoiceProvider;
use crate::error::Result;
use crate::invoice::{self, NormalizedInvoice, NormalizedInvoiceDetail};
use crate::notify::{self, Notifier};
use crate::upload::UploadBackend;
use crate::window::DateWindow;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub notified: usize,
}

/// One sync run. The first error aborts; invoices already processed stay processed.
pub async fn run(
    provider: &dyn InvoiceProvider,
    backend: &mut dyn UploadBackend,
    notifier: &dyn Notifier,
    window: DateWindow,
) -> Result<RunSummary> {
    backend.authenticate().await?;

    let raw = provider.fetch_invoices(window.start, window.end).await?;
    info!(count = raw.len(), start = %window.start, end = %window.end, "Fetched invoices");

    let parsed = raw
        .iter()
        .map(invoice::normalize_invoice)
        .collect::<Result<Vec<_>>>()?;
    info!(count = parsed.len(), "Parsed invoices");
    debug!(?parsed);

    let result = backend.upload_invoices(&parsed).await?;
    info!(count = result.created.len(), "Created invoices");
    info!(count = result.updated.len(), "Updated invoices");

    let mut summary = RunSummary {
        fetched: raw.len(),
        created: result.created.len(),
        updated: result.updated.len(),
        notified: 0,
    };

    // Already-known invoices keep the details uploaded on their first run.
    for created in &result.created {
        let details = sync_details(provider, &*backend, created).await?;
        notifier
            .send(&notify::compose_notification(created, &details))
            .await?;
        summary.notified += 1;
    }

    Ok(summary)
}

async fn sync_details(
    provider: &dyn InvoiceProvider,
    backend: &dyn UploadBackend,
    invoice: &NormalizedInvoice,
) -> Result<Vec<NormalizedInvoiceDetail>> {
    let raw = provider
        .fetch_details(&invoice.number, invoice.timestamp.date())
        .await?;
    info!(invoice = %invoice.number, count = raw.len(), "Fetched details");

    let details: Vec<NormalizedInvoiceDetail> =
        raw.iter().map(invoice::normalize_detail).collect();
    debug!(?details);

    let result = backend.upload_details(&invoice.number, &details).await?;
    debug!(invoice = %invoice.number, %result, "Uploaded details");
    Ok(details)
}
