//! Check command

use crate::cli::CheckArgs;
use crate::output;
use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use cup_core::{ConfigLoader, CupConfig, ImageReference, ImageResult, UpdateStatus};
use cup_registry::{CheckRequest, UpdateChecker};
use serde::Serialize;
use tracing::debug;

/// JSON shape of one result: the result fields plus its derived status
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    result: &'a ImageResult,
    #[serde(flatten)]
    status: UpdateStatus,
}

pub async fn run(args: CheckArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    if !args.digests.is_empty() && args.images.len() > 1 {
        bail!("--digest can only be used when checking a single image");
    }

    let config = load_config(config_path, &args)?;
    let requests = build_requests(&args, &config)?;
    debug!(
        "Checking {} images with policy {}",
        requests.len(),
        config.selection_policy
    );

    let checker = UpdateChecker::new(config).context("Failed to create registry client")?;

    let results = if args.json {
        checker.check_all(requests).await
    } else {
        let spinner = output::spinner(&format!("Checking {} image(s)...", requests.len()));
        let results = checker.check_all(requests).await;
        spinner.finish_and_clear();
        results
    };

    if args.json {
        let reports: Vec<Report> = results
            .iter()
            .map(|result| Report {
                result,
                status: result.status(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        results.iter().for_each(print_result);
    }

    let failed = results.iter().filter(|r| r.is_error()).count();
    if failed > 0 {
        bail!("{} of {} checks failed", failed, results.len());
    }

    Ok(())
}

/// Load the config file and apply CLI overrides
fn load_config(config_path: Option<&Utf8Path>, args: &CheckArgs) -> Result<CupConfig> {
    let loader = ConfigLoader::new()?;
    let mut config = match config_path {
        Some(path) => loader.load_from(path)?,
        None => loader.load()?,
    };

    if let Some(policy) = args.policy {
        config.selection_policy = policy;
    }

    Ok(config)
}

fn build_requests(args: &CheckArgs, config: &CupConfig) -> Result<Vec<CheckRequest>> {
    args.images
        .iter()
        .map(|image| {
            let reference = ImageReference::parse(image)
                .with_context(|| format!("Invalid image reference: {}", image))?;

            let mut registry = config.registry(&reference.registry);
            let overridden = args.insecure || args.username.is_some();
            if args.insecure {
                registry.insecure = true;
            }
            if let (Some(username), Some(password)) = (&args.username, &args.password) {
                registry = registry.with_credentials(username.as_str(), password.as_str());
            }

            let mut request = CheckRequest::from_reference(reference)
                .local_digests(args.digests.iter().cloned())
                .ignore_update_type(args.ignore);
            if overridden {
                request = request.registry_config(registry);
            }

            Ok(request)
        })
        .collect()
}

fn print_result(result: &ImageResult) {
    output::header(&result.reference.to_string());

    let status = result.status();
    match status {
        UpdateStatus::UpToDate => output::success("Up to date"),
        UpdateStatus::Version(_) => {
            output::info(&format!("{} available", status));
            if let Some(info) = &result.version_info {
                output::kv("Current", &info.current_tag.to_string());
                if let Some(latest) = info.format_latest() {
                    output::kv("Latest", &latest);
                }
            }
        }
        UpdateStatus::Digest => output::info("A new image was published under the same tag"),
        UpdateStatus::Unknown => match &result.error {
            Some(error) => {
                output::error(&error.to_string());
                if error.is_auth_failure() {
                    output::kv(
                        "Hint",
                        "pass --username/--password or add credentials for this registry to the config",
                    );
                }
            }
            None => output::warning("Could not determine update status"),
        },
    }

    if let Some(digest_info) = &result.digest_info {
        match &digest_info.remote_digest {
            Some(remote) => output::kv("Remote digest", remote),
            // Only the digest stage leaves a version without a latest tag
            None if result
                .version_info
                .as_ref()
                .is_some_and(|v| v.latest_remote_tag.is_none()) =>
            {
                output::warning("Registry did not report a digest for this tag")
            }
            None => {}
        }
    }
}
