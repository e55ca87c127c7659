use std::sync::Arc;

use crate::config::{AppConfig, LoadedConfig};
use crate::error::AppResult;
use crate::permission::{PermissionGateway, PermissionStrategy, PermissionSystem};
use crate::session::SessionServices;
use crate::share::{ShareService, ShareSurface};
use crate::storage::{MediaIndex, StorageLayout, StorageResult, StorageService};

/// Wires the process-wide services from configuration. Prunes stale scratch
/// files as a side effect.
pub fn build_services<P, M, S>(
    loaded: &LoadedConfig,
    system: P,
    media_index: M,
    surface: S,
) -> AppResult<SessionServices<P, M, S>>
where
    P: PermissionSystem,
    M: MediaIndex,
    S: ShareSurface,
{
    let config = &loaded.config;
    let strategy = PermissionStrategy::resolve(config.android_api_level);
    tracing::info!(?strategy, "resolved permission strategy");

    let catalog = config
        .frame_catalog(loaded.config_dir.as_deref())?
        .into_shared();
    tracing::info!(frames = catalog.len(), "loaded frame catalog");

    let layout = resolve_storage_layout(config)?;
    tracing::info!(
        scratch_dir = %layout.scratch_dir.display(),
        pictures_dir = %layout.pictures_dir.display(),
        file_prefix = %layout.file_prefix,
        "resolved storage layout"
    );

    let permissions = Arc::new(PermissionGateway::new(strategy, system));
    let storage = StorageService::new(layout, Arc::clone(&permissions), media_index);
    prune_stale_scratch(&storage, config.stale_scratch_hours());

    Ok(SessionServices {
        catalog,
        permissions,
        storage: Arc::new(storage),
        share: Arc::new(ShareService::new(surface)),
        share_title: config.share_title().to_string(),
    })
}

/// Configured directories win; the rest comes from the platform defaults.
pub(super) fn resolve_storage_layout(config: &AppConfig) -> StorageResult<StorageLayout> {
    let mut layout = match (&config.scratch_dir, &config.pictures_dir) {
        (Some(scratch_dir), Some(pictures_dir)) => {
            StorageLayout::new(scratch_dir.clone(), pictures_dir.clone())
        }
        (scratch_dir, pictures_dir) => {
            let mut defaults = StorageLayout::with_default_paths(config.album.as_deref())?;
            if let Some(dir) = scratch_dir {
                defaults.scratch_dir = dir.clone();
            }
            if let Some(dir) = pictures_dir {
                defaults.pictures_dir = dir.clone();
            }
            defaults
        }
    };

    if let Some(prefix) = config
        .file_prefix
        .as_deref()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
    {
        layout = layout.with_file_prefix(prefix);
    }
    Ok(layout)
}

fn prune_stale_scratch<P: PermissionSystem, M: MediaIndex>(
    storage: &StorageService<P, M>,
    max_age_hours: u64,
) {
    match storage.prune_stale_scratch(max_age_hours) {
        Ok(report) if report.removed_files > 0 => {
            tracing::info!(
                removed_files = report.removed_files,
                "pruned stale capture scratch files"
            );
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(max_age_hours, ?err, "failed to prune stale capture scratch files");
        }
    }
}
