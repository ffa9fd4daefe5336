// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Remote site rendezvous: site lookup and tunnel keep-alive

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error};

use crate::error::{ParadoxError, Result};

use super::LinkState;

/// Site lookup reply. Only the fields the tunnel needs are kept.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SiteInfo {
    #[serde(default)]
    pub site: Vec<Site>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Site {
    #[serde(default)]
    pub module: Vec<SiteModule>,
}

/// One IP module registered for a site.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SiteModule {
    #[serde(rename = "panelSerial")]
    pub panel_serial: String,
    /// Broker address the tunnel is requested from.
    pub xoraddr: String,
}

impl SiteInfo {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ParadoxError::parse(format!("site info: {}", e)))
    }

    pub fn modules(&self) -> impl Iterator<Item = &SiteModule> {
        self.site.iter().flat_map(|s| s.module.iter())
    }

    /// The module serving `panel_serial`, or the first one when no serial is configured.
    pub fn select_module(&self, panel_serial: Option<&str>) -> Result<&SiteModule> {
        let mut modules = self.modules();
        let found = match panel_serial {
            Some(serial) => modules.find(|m| m.panel_serial.eq_ignore_ascii_case(serial)),
            None => modules.next(),
        };
        found.ok_or_else(|| ParadoxError::ConnectToIpModuleFailed {
            reason: match panel_serial {
                Some(serial) => format!("no module for panel serial {} in site", serial),
                None => "site has no modules".to_string(),
            },
        })
    }
}

/// Broker that hands out a TCP tunnel to a panel behind NAT.
///
/// `connect` performs the broker's CONNECT / CONNECTION-BIND exchange and
/// returns the bound tunnel socket; `refresh` keeps the broker session alive.
#[async_trait]
pub trait SiteRendezvous: Send + Sync {
    async fn site_info(&self, site_id: &str, email: &str) -> Result<SiteInfo>;

    async fn connect(&self, module: &SiteModule) -> Result<TcpStream>;

    async fn refresh(&self) -> Result<()>;
}

/// Refresh the broker session every `every`; a failed refresh drops the link.
pub(crate) fn spawn_refresh(
    rendezvous: Arc<dyn SiteRendezvous>,
    every: Duration,
    state: LinkState,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match rendezvous.refresh().await {
                Ok(()) => debug!("Site session refreshed"),
                Err(e) => {
                    let e = ParadoxError::StunSessionRefreshFailed { reason: e.to_string() };
                    error!("{}", e);
                    state.lost();
                    state.shutdown.notify_one();
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const SITE: &str = r#"{
        "site": [{
            "siteId": "home",
            "module": [
                {"panelSerial": "05AB1234", "xoraddr": "10.1.2.3", "port": 10000},
                {"panelSerial": "05CD5678", "xoraddr": "10.1.2.4"}
            ]
        }]
    }"#;

    #[test]
    fn test_select_module() {
        let info = SiteInfo::from_json(SITE).unwrap();
        assert_eq!(info.modules().count(), 2);
        assert_eq!(info.select_module(None).unwrap().xoraddr, "10.1.2.3");
        assert_eq!(info.select_module(Some("05cd5678")).unwrap().xoraddr, "10.1.2.4");
        assert!(matches!(
            info.select_module(Some("FFFFFFFF")),
            Err(ParadoxError::ConnectToIpModuleFailed { .. })
        ));
        assert!(SiteInfo::from_json("{\"site\": 3}").is_err());
    }

    struct FailingBroker {
        refreshes: AtomicU32,
    }

    #[async_trait]
    impl SiteRendezvous for FailingBroker {
        async fn site_info(&self, _site_id: &str, _email: &str) -> Result<SiteInfo> {
            SiteInfo::from_json(SITE)
        }

        async fn connect(&self, _module: &SiteModule) -> Result<TcpStream> {
            Err(ParadoxError::NotConnected)
        }

        async fn refresh(&self) -> Result<()> {
            if self.refreshes.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(())
            } else {
                Err(ParadoxError::Timeout { request: "refresh".into() })
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_drops_link() {
        let broker = Arc::new(FailingBroker { refreshes: AtomicU32::new(0) });
        let state = LinkState::new();
        let task = spawn_refresh(broker.clone(), Duration::from_secs(500), state.clone());
        task.await.unwrap();
        assert_eq!(broker.refreshes.load(Ordering::SeqCst), 2);
        assert!(!state.connected.load(Ordering::SeqCst));
    }
}
