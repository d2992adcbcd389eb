// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::API_GROUP;
use crate::error::Result;
use crate::types::Plan;
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Block until API discovery serves the Plan kind, backing off between polls
pub async fn wait_for_plan_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_plan_crd_exists(client).await {
            Ok(true) => {
                info!("Plan CRD ({}) is available", Plan::api_version(&()));
                return Ok(());
            }
            Ok(false) => info!("Plan CRD not served yet, next check in {}s", interval),
            Err(e) => warn!("Plan CRD discovery failed ({}), next check in {}s", e, interval),
        }

        sleep(Duration::from_secs(interval)).await;
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn check_plan_crd_exists(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await?;

    let served = discovery.get(API_GROUP).is_some_and(|group| {
        group
            .recommended_resources()
            .iter()
            .any(|(ar, _)| ar.kind == Plan::kind(&()) && ar.version == Plan::version(&()))
    });
    Ok(served)
}
