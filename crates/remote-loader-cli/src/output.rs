//! Rendering of load results.
use std::io::Write;

use anyhow::Result;
use console::style;
use remote_loader::LoadError;
use remote_loader::decode::SniffedImage;
use serde::Serialize;

/// What happened to a single URL.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub url: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn from_result(url: &str, result: Result<SniffedImage, LoadError>) -> Self {
        match result {
            Ok(image) => Self::loaded(url, image),
            Err(error) => Self {
                url: url.to_owned(),
                status: error.metrics_tag(),
                format: None,
                size: None,
                error: Some(error.to_string()),
            },
        }
    }

    pub fn from_cached(url: &str, image: Option<SniffedImage>) -> Self {
        match image {
            Some(image) => Self::loaded(url, image),
            None => Self {
                url: url.to_owned(),
                status: "uncached",
                format: None,
                size: None,
                error: None,
            },
        }
    }

    fn loaded(url: &str, image: SniffedImage) -> Self {
        Self {
            url: url.to_owned(),
            status: "ok",
            format: Some(image.format.name()),
            size: Some(image.data.len()),
            error: None,
        }
    }
}

pub fn print_pretty(out: &mut impl Write, outcomes: &[Outcome]) -> Result<()> {
    for outcome in outcomes {
        match (outcome.format, outcome.size) {
            (Some(format), Some(size)) => writeln!(
                out,
                "{} {} ({format}, {size} bytes)",
                style("ok").green(),
                outcome.url
            )?,
            _ => {
                let reason = outcome.error.as_deref().unwrap_or(outcome.status);
                writeln!(out, "{} {} ({reason})", style("--").red(), outcome.url)?
            }
        }
    }
    Ok(())
}

pub fn print_json(out: &mut impl Write, outcomes: &[Outcome]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, outcomes)?;
    writeln!(out)?;
    Ok(())
}
