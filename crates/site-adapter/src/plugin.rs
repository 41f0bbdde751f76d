use async_trait::async_trait;

use sitehook_core_types::NodeId;

use crate::adapter::SiteAdapter;
use crate::errors::AdapterResult;
use crate::model::{AdapterCapability, AdapterState};

/// Contract between the host runtime and a site adapter.
#[async_trait]
pub trait AdapterPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn hostnames(&self) -> &[String];
    fn capabilities(&self) -> &'static [AdapterCapability];
    fn state(&self) -> AdapterState;

    async fn initialize(&self) -> AdapterResult<()>;
    async fn activate(&self) -> AdapterResult<()>;
    async fn deactivate(&self) -> AdapterResult<()>;
    async fn cleanup(&self) -> AdapterResult<()>;

    async fn insert_text(&self, text: &str, target: Option<NodeId>) -> bool;
    async fn submit_form(&self) -> bool;
    async fn is_supported(&self) -> bool;

    async fn on_page_changed(&self, _url: &str) {}
    async fn on_host_changed(&self, _host: &str) {}
}

pub const CAPABILITIES: &[AdapterCapability] = &[
    AdapterCapability::TextInsertion,
    AdapterCapability::FormSubmission,
    AdapterCapability::DomManipulation,
    AdapterCapability::UrlNavigation,
];

#[async_trait]
impl AdapterPlugin for SiteAdapter {
    fn name(&self) -> &str {
        &self.config().name
    }

    fn version(&self) -> &str {
        &self.config().version
    }

    fn hostnames(&self) -> &[String] {
        &self.config().site.hostnames
    }

    fn capabilities(&self) -> &'static [AdapterCapability] {
        CAPABILITIES
    }

    fn state(&self) -> AdapterState {
        SiteAdapter::state(self)
    }

    async fn initialize(&self) -> AdapterResult<()> {
        SiteAdapter::initialize(self).await
    }

    async fn activate(&self) -> AdapterResult<()> {
        SiteAdapter::activate(self).await
    }

    async fn deactivate(&self) -> AdapterResult<()> {
        SiteAdapter::deactivate(self).await
    }

    async fn cleanup(&self) -> AdapterResult<()> {
        SiteAdapter::cleanup(self).await
    }

    async fn insert_text(&self, text: &str, target: Option<NodeId>) -> bool {
        SiteAdapter::insert_text(self, text, target).await
    }

    async fn submit_form(&self) -> bool {
        SiteAdapter::submit_form(self).await
    }

    async fn is_supported(&self) -> bool {
        SiteAdapter::is_supported(self).await
    }

    async fn on_page_changed(&self, url: &str) {
        SiteAdapter::on_page_changed(self, url).await
    }

    async fn on_host_changed(&self, host: &str) {
        SiteAdapter::on_host_changed(self, host).await
    }
}
