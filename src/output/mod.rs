use crate::cli::OutputFormat;
use crate::pipeline::RelayOutcome;
use crate::uploader::UploadedAsset;

/// Final line of a successful relay
pub fn completion_line(asset: &UploadedAsset) -> String {
    format!("Process completed. File URL: {}", asset.secure_url)
}

/// Render a finished relay for the console
pub fn render_outcome(outcome: &RelayOutcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => completion_line(&outcome.hosted),
        OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_else(|e| {
            tracing::warn!("Falling back to text output: {}", e);
            completion_line(&outcome.hosted)
        }),
    }
}

/// Render a single uploaded asset (the `upload` command)
pub fn render_asset(asset: &UploadedAsset, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("File URL: {}", asset.secure_url),
        OutputFormat::Json => serde_json::to_string_pretty(asset)
            .unwrap_or_else(|_| format!("File URL: {}", asset.secure_url)),
    }
}
