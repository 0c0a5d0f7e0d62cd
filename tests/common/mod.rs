#![allow(dead_code)]

use merchant_hub::config::Settings;
use merchant_hub::infrastructure::file_ledger::FileHistoryStore;
use merchant_hub::infrastructure::gateway::PassthroughGatewayFactory;
use merchant_hub::infrastructure::in_memory::InMemorySessionStore;
use merchant_hub::application::dispatcher::CallbackDispatcher;
use serde_json::json;
use std::path::{Path, PathBuf};

pub fn settings_json(data_dir: &Path) -> serde_json::Value {
    json!({
        "base_url": "https://shop.test/",
        "data_dir": data_dir,
        "remembered_url_ttl_secs": 3600,
        "merchants": {
            "paypal": {
                "purse": "p1",
                "secret": "s1",
                "checkout_url": "https://pay.test/checkout"
            },
            "webmoney": {
                "purse": "Z100",
                "secret": "s2",
                "checkout_url": "https://merchant.wm.test/pay",
                "pages": {"notify": {"route": "hooks/webmoney", "params": {"v": "2"}}}
            }
        }
    })
}

/// Writes a settings file into `dir` whose history lives in `dir/data`.
pub fn write_settings(dir: &Path) -> PathBuf {
    let path = dir.join("merchant.json");
    let body = serde_json::to_string_pretty(&settings_json(&dir.join("data"))).unwrap();
    std::fs::write(&path, body).unwrap();
    path
}

pub fn file_dispatcher(data_dir: &Path) -> CallbackDispatcher {
    let settings = Settings::from_json(&settings_json(data_dir).to_string()).unwrap();
    settings
        .build_dispatcher(
            Box::new(FileHistoryStore::new(&settings.data_dir)),
            Box::new(InMemorySessionStore::new()),
            Box::new(PassthroughGatewayFactory),
        )
        .unwrap()
}
