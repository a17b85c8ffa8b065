//! Background cache warm-up.
//!
//! When `FLEETSYNC_REFRESH_CRON` is set, a [`JobScheduler`] job runs the
//! freshness-gated read for every dataset kind, so API callers rarely pay for
//! an upstream fetch themselves.

use std::sync::Arc;

use fleetsync_core::DataKind;
use fleetsync_sync::TrackingService;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the scheduler with the warm-up job on `cron`.
///
/// `cron` uses the six-field form with seconds (`0 */5 * * * *`). The
/// returned handle must be kept alive for the lifetime of the process;
/// dropping it shuts the job down.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the expression does not parse or the
/// scheduler cannot be started.
pub async fn build_scheduler(
    service: Arc<TrackingService>,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let service = Arc::clone(&service);
        Box::pin(async move {
            tracing::info!("scheduler: starting cache warm-up");
            warm_caches(&service).await;
            tracing::info!("scheduler: cache warm-up complete");
        })
    })?;
    scheduler.add(job).await?;

    scheduler.start().await?;
    tracing::info!(cron, "scheduler: warm-up job registered");
    Ok(scheduler)
}

/// Reads every dataset through the freshness gate. Failures are logged and
/// never stop the remaining kinds.
pub async fn warm_caches(service: &TrackingService) {
    for kind in DataKind::ALL {
        match service.get_current_data(kind).await {
            Ok(dataset) => {
                tracing::info!(kind = %kind, records = dataset.len(), "scheduler: dataset warm");
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "scheduler: warm-up read failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_soap::{SoapClient, SoapEndpoint};
    use fleetsync_sync::{DatasetStore, MemoryStore, RetrievalAudit};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(upstream_uri: &str, store: &Arc<MemoryStore>) -> TrackingService {
        TrackingService::new(
            SoapClient::new(2, "fleetsync-test", "http://tempuri.org").expect("client"),
            SoapEndpoint::new(format!("{upstream_uri}/garages"), "GetGaraj_json"),
            SoapEndpoint::new(format!("{upstream_uri}/buses"), "GetFiloAracKonum_json"),
            Arc::clone(store) as Arc<dyn DatasetStore>,
            Arc::clone(store) as Arc<dyn RetrievalAudit>,
            5,
        )
    }

    #[tokio::test]
    async fn warm_caches_fetches_each_kind_once() {
        let server = MockServer::start().await;
        for (route, method_name) in [("/garages", "GetGaraj_json"), ("/buses", "GetFiloAracKonum_json")] {
            let body = format!(
                "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
                 <soap:Body><{method_name}Response><{method_name}Result>\
                 [{{\"ID\":1,\"GARAJ_KODU\":\"A\",\"KapiNo\":\"K1\",\"Plaka\":\"34 K 1\"}}]\
                 </{method_name}Result></{method_name}Response></soap:Body></soap:Envelope>"
            );
            Mock::given(method("POST"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1)
                .mount(&server)
                .await;
        }
        let store = Arc::new(MemoryStore::new());
        let service = service(&server.uri(), &store);

        warm_caches(&service).await;
        // Both kinds are fresh now, so a second warm-up stays local.
        warm_caches(&service).await;

        assert_eq!(store.find_all_facilities().await.expect("facilities").len(), 1);
        assert_eq!(store.find_all_vehicles().await.expect("vehicles").len(), 1);
    }

    #[tokio::test]
    async fn build_scheduler_rejects_invalid_cron() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(service("http://127.0.0.1:9", &store));

        assert!(build_scheduler(service, "not a cron expression").await.is_err());
    }
}
