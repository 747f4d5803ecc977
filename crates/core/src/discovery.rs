use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::{Services, SyncContext};
use crate::models::{Category, Removal};
use crate::runner::{RepositoryTask, TaskBatch, TaskRunner};
use crate::traits::BLACKLIST_LIST;

/// What a discovery pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Names found across the default lists of active categories
    pub listed: usize,
    /// Names newly added to the blacklist
    pub blacklisted: Vec<String>,
    /// Repositories added to the registry
    pub registered: Vec<String>,
}

/// Fetch the default lists and register every repository not yet known
pub async fn load_known_repositories(
    ctx: &mut SyncContext,
    services: &Services,
    runner: &TaskRunner,
) -> DiscoveryReport {
    info!("Loading known repositories");
    ctx.status.set_reloading_data(true);

    let mut report = DiscoveryReport::default();
    let lists = fetch_default_lists(ctx, services).await;
    report.listed = lists.iter().map(|(_, names)| names.len()).sum();

    for (_, names) in &lists {
        for name in names {
            if !ctx
                .common
                .default
                .iter()
                .any(|known| known.eq_ignore_ascii_case(name))
            {
                ctx.common.default.push(name.clone());
            }
        }
    }

    match services.remote.get_default_lists(BLACKLIST_LIST).await {
        Ok(blacklist) => {
            for name in blacklist {
                if ctx.common.blacklist.insert(&name) {
                    ctx.common.removed.record(&name, Removal::blacklisted());
                    report.blacklisted.push(name);
                }
            }
        }
        Err(e) => warn!("Could not fetch the blacklist: {}", e),
    }

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut batch = TaskBatch::new();
    let mut queued: Vec<String> = Vec::new();

    for (category, names) in lists {
        for name in names {
            if ctx.common.blacklist.contains(&name)
                || ctx.registry.is_known(&name)
                || queued.iter().any(|q| q.eq_ignore_ascii_case(&name))
            {
                continue;
            }
            queued.push(name.clone());

            let operations = Arc::clone(&services.operations);
            let sender = sender.clone();
            batch.push(RepositoryTask::new(
                format!("register {}", name),
                async move {
                    let entry = operations.register(&name, category).await?;
                    // The receiver outlives the batch
                    let _ = sender.send(entry);
                    Ok(())
                },
            ));
        }
    }
    drop(sender);

    runner.submit(batch).await;

    while let Ok(entry) = receiver.try_recv() {
        let full_name = entry.full_name().to_string();
        if ctx.registry.register(entry, false).await {
            report.registered.push(full_name);
        }
    }

    ctx.status.set_reloading_data(false);
    info!(
        "Loading known repositories finished, {} new",
        report.registered.len()
    );
    report
}

async fn fetch_default_lists(
    ctx: &SyncContext,
    services: &Services,
) -> Vec<(Category, Vec<String>)> {
    let mut lists = Vec::with_capacity(ctx.common.categories.len());
    for category in &ctx.common.categories {
        let mut names = match services.remote.get_default_lists(category.as_str()).await {
            Ok(names) => {
                debug!("{} default repositories for {}", names.len(), category);
                names
            }
            Err(e) => {
                warn!("Could not fetch default list for {}: {}", category, e);
                Vec::new()
            }
        };

        match services.remote.get_org_repositories(*category).await {
            Ok(org) => {
                for name in org {
                    if !names.iter().any(|known| known.eq_ignore_ascii_case(&name)) {
                        names.push(name);
                    }
                }
            }
            Err(e) => warn!("Could not fetch organisation repositories for {}: {}", category, e),
        }

        if !names.is_empty() {
            lists.push((*category, names));
        }
    }
    lists
}
