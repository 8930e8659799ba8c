//! HTTP client for the catalog/lead backend.
//!
//! Every call goes through one retry loop: up to `max_retries` attempts,
//! exponential backoff (1s, 2s, 4s, ..) between retryable failures.
//! 4xx responses are never retried — the request itself is wrong and a
//! second attempt cannot fix it.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::BotConfig;
use crate::error::{ApiError, ApiResult};

use super::types::{
    Category, City, CreatedLead, Gearbox, InstructorDetail, InstructorSummary, LeadRequest,
    ResolvedTariff, SchoolDetail, SchoolSummary, Tariff, TariffFilter, TrainingFormat,
    TrainingTime,
};

/// Catalog and lead operations the flows depend on.
///
/// Flow handlers only see this trait; tests drive them with in-memory
/// implementations.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_cities(&self) -> ApiResult<Vec<City>>;
    async fn list_categories(&self) -> ApiResult<Vec<Category>>;
    async fn list_training_formats(&self) -> ApiResult<Vec<TrainingFormat>>;
    async fn list_training_times(&self) -> ApiResult<Vec<TrainingTime>>;
    async fn list_schools(&self, city_id: i64) -> ApiResult<Vec<SchoolSummary>>;
    /// School card with its tariff list, pre-filtered server-side by the
    /// optional filter fields.
    async fn school_detail(&self, school_id: i64, filter: TariffFilter) -> ApiResult<SchoolDetail>;
    async fn list_instructors(
        &self,
        city_id: i64,
        category_id: i64,
        gearbox: Option<Gearbox>,
        gender: Option<&str>,
    ) -> ApiResult<Vec<InstructorSummary>>;
    async fn instructor_detail(&self, instructor_id: i64) -> ApiResult<InstructorDetail>;
    /// Find the tariff carrying `plan_code`, optionally restricted to a
    /// category. With `school_id` only that school's tariff list is
    /// searched; without it the catalog is scanned. Returns `Ok(None)`
    /// when no active school offers the plan.
    async fn resolve_online_tariff(
        &self,
        plan_code: &str,
        category_id: Option<i64>,
        school_id: Option<i64>,
    ) -> ApiResult<Option<ResolvedTariff>>;
    async fn create_lead(&self, lead: &LeadRequest) -> ApiResult<CreatedLead>;
}

/// Backend client over reqwest.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    max_retries: u32,
    tariff_scan_cap: usize,
}

impl ApiClient {
    pub fn new(config: &BotConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Unknown(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries.max(1),
            tariff_scan_cap: config.tariff_scan_cap,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        self.request_with_retry(|| {
            self.http
                .get(self.url(path))
                .header("Authorization", format!("Api-Key {}", self.api_key.expose_secret()))
                .query(query)
        })
        .await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request_with_retry(|| {
            self.http
                .post(self.url(path))
                .header("Authorization", format!("Api-Key {}", self.api_key.expose_secret()))
                .json(body)
        })
        .await
    }

    async fn request_with_retry<T, F>(&self, build: F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = ApiError::Unknown("no attempt made".into());
        for attempt in 1..=self.max_retries {
            match Self::execute(build()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        max = self.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "API request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    async fn execute<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> ApiResult<T> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Unknown(format!("malformed response body: {e}")));
        }
        if status.is_client_error() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > 512 {
                let cut = (0..=512).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ApiError::Client {
                status: status.as_u16(),
                body,
            });
        }
        Err(ApiError::Server {
            status: status.as_u16(),
        })
    }
}

fn pick_plan<'a>(
    tariffs: &'a [Tariff],
    plan_code: &str,
    category_id: Option<i64>,
) -> Option<&'a Tariff> {
    tariffs.iter().find(|t| {
        t.code.as_deref() == Some(plan_code)
            && match (category_id, t.category_id) {
                (Some(selected), Some(bound)) => selected == bound,
                _ => true,
            }
    })
}

fn resolved(tariff: &Tariff, school_id: i64) -> ResolvedTariff {
    ResolvedTariff {
        tariff_plan_id: tariff.tariff_plan_id,
        name: tariff.localized_name(),
        price_kzt: tariff.price_kzt,
        school_id,
        training_format_id: tariff.training_format_id,
    }
}

fn classify_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else if error.is_connect() || error.is_request() {
        ApiError::Network(error.to_string())
    } else {
        ApiError::Unknown(error.to_string())
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    async fn list_cities(&self) -> ApiResult<Vec<City>> {
        self.get_json("/dicts/cities", &[]).await
    }

    async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.get_json("/dicts/categories", &[]).await
    }

    async fn list_training_formats(&self) -> ApiResult<Vec<TrainingFormat>> {
        self.get_json("/dicts/training-formats", &[]).await
    }

    async fn list_training_times(&self) -> ApiResult<Vec<TrainingTime>> {
        self.get_json("/dicts/training-times", &[]).await
    }

    async fn list_schools(&self, city_id: i64) -> ApiResult<Vec<SchoolSummary>> {
        self.get_json("/schools", &[("city_id", city_id.to_string())])
            .await
    }

    async fn school_detail(&self, school_id: i64, filter: TariffFilter) -> ApiResult<SchoolDetail> {
        let mut query = Vec::new();
        if let Some(category_id) = filter.category_id {
            query.push(("category_id", category_id.to_string()));
        }
        if let Some(training_format_id) = filter.training_format_id {
            query.push(("training_format_id", training_format_id.to_string()));
        }
        if let Some(training_time_id) = filter.training_time_id {
            query.push(("training_time_id", training_time_id.to_string()));
        }
        self.get_json(&format!("/schools/{school_id}"), &query).await
    }

    async fn list_instructors(
        &self,
        city_id: i64,
        category_id: i64,
        gearbox: Option<Gearbox>,
        gender: Option<&str>,
    ) -> ApiResult<Vec<InstructorSummary>> {
        let mut query = vec![
            ("city_id", city_id.to_string()),
            ("category_id", category_id.to_string()),
        ];
        if let Some(gearbox) = gearbox {
            let tag = match gearbox {
                Gearbox::Automatic => "AUTOMATIC",
                Gearbox::Manual => "MANUAL",
            };
            query.push(("gearbox", tag.to_string()));
        }
        if let Some(gender) = gender {
            query.push(("gender", gender.to_string()));
        }
        self.get_json("/instructors", &query).await
    }

    async fn instructor_detail(&self, instructor_id: i64) -> ApiResult<InstructorDetail> {
        self.get_json(&format!("/instructors/{instructor_id}"), &[])
            .await
    }

    /// Online products are not city-bound, but the schools endpoint is.
    /// With a known school only its tariff list is checked; otherwise
    /// walk cities and their schools, fetching details until a tariff
    /// with the wanted plan code turns up. The number of detail fetches
    /// is capped so a misconfigured catalog cannot turn one chat message
    /// into an unbounded crawl.
    async fn resolve_online_tariff(
        &self,
        plan_code: &str,
        category_id: Option<i64>,
        school_id: Option<i64>,
    ) -> ApiResult<Option<ResolvedTariff>> {
        if let Some(school_id) = school_id {
            let detail = self.school_detail(school_id, TariffFilter::default()).await?;
            return Ok(pick_plan(&detail.tariffs, plan_code, category_id)
                .map(|t| resolved(t, detail.id)));
        }
        let mut fetches = 0usize;
        for city in self.list_cities().await? {
            for school in self.list_schools(city.id).await? {
                if fetches >= self.tariff_scan_cap {
                    tracing::warn!(
                        plan_code,
                        cap = self.tariff_scan_cap,
                        "online tariff scan cap reached"
                    );
                    return Ok(None);
                }
                fetches += 1;
                let detail = self.school_detail(school.id, TariffFilter::default()).await?;
                if let Some(tariff) = pick_plan(&detail.tariffs, plan_code, category_id) {
                    return Ok(Some(resolved(tariff, detail.id)));
                }
            }
        }
        Ok(None)
    }

    async fn create_lead(&self, lead: &LeadRequest) -> ApiResult<CreatedLead> {
        self.post_json("/leads", lead).await
    }
}
