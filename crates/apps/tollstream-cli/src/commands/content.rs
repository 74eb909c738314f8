//! Content lookup command.

use tollstream_settle::{ContentApi, HttpBackend};
use tollstream_types::{Content, ContentId};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::{ContentOutput, OutputFormat, Render};
use crate::progress;

/// Execute the content command.
pub async fn content(
    config: CliConfig,
    format: OutputFormat,
    content_id: &str,
) -> CliResult<String> {
    let backend = HttpBackend::new(&config.backend_config()?)?;
    let id = ContentId::new(content_id);

    let item = match format {
        OutputFormat::Human => {
            progress::with_spinner("Fetching content", fetch(&backend, &id)).await?
        }
        OutputFormat::Json => fetch(&backend, &id).await?,
    };

    Ok(describe(item).render(format))
}

async fn fetch<A: ContentApi>(api: &A, id: &ContentId) -> CliResult<Content> {
    Ok(api.get_content(id).await?)
}

fn describe(item: Content) -> ContentOutput {
    ContentOutput {
        window_price_minor: item.window_price(),
        windows: item.window_count(),
        id: item.id.to_string(),
        title: item.title,
        price_per_second_minor: item.price_per_second_minor,
        duration_seconds: item.duration_seconds,
        playback_url: item.playback_reference,
    }
}
