//! Test helpers for the Tencent Cloud API

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
pub fn create_test_client(url: &str) -> super::Client {
    let config = crate::config::ProviderConfig::builder()
        .secret_id("AKIDtest")
        .secret_key("test-secret")
        .region("ap-guangzhou")
        .endpoint(url)
        .build()
        .unwrap();
    super::Client::new(config).unwrap()
}
