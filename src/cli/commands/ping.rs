use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::SummaryService;

pub async fn handle(service: &SummaryService, output_format: OutputFormat) -> anyhow::Result<()> {
    let started = std::time::Instant::now();
    service.ping().await?;
    output_success(
        output_format,
        &format!("Database reachable through tunnel ({:?})", started.elapsed()),
        None,
    )
}
