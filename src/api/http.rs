use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::ApiSession;
use crate::error::{Result, SolarFetchError};
use crate::models::{IntervalLabel, IntervalValueType, Observation, ObservationValue, Site};

/// Observation as it travels over the wire, referring to its site by id
#[derive(Debug, Serialize, Deserialize)]
struct ObservationWire {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    observation_id: String,
    name: String,
    variable: String,
    interval_label: IntervalLabel,
    interval_length: i64,
    interval_value_type: IntervalValueType,
    site_id: String,
    uncertainty: f64,
    #[serde(default)]
    extra_parameters: String,
}

impl ObservationWire {
    fn from_observation(observation: &Observation) -> Self {
        Self {
            observation_id: observation.observation_id.clone(),
            name: observation.name.clone(),
            variable: observation.variable.clone(),
            interval_label: observation.interval_label,
            interval_length: observation.interval_length,
            interval_value_type: observation.interval_value_type,
            site_id: observation.site.site_id.clone(),
            uncertainty: observation.uncertainty,
            extra_parameters: observation.extra_parameters.clone(),
        }
    }

    fn into_observation(self, site: Site) -> Observation {
        Observation {
            observation_id: self.observation_id,
            name: self.name,
            variable: self.variable,
            interval_label: self.interval_label,
            interval_length: self.interval_length,
            interval_value_type: self.interval_value_type,
            site,
            uncertainty: self.uncertainty,
            extra_parameters: self.extra_parameters,
        }
    }
}

#[derive(Serialize)]
struct ValuesPayload<'a> {
    values: &'a [ObservationValue],
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()?)
}

/// HTTP implementation of [`ApiSession`]
#[derive(Debug, Clone)]
pub struct HttpApiSession {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpApiSession {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Replace the overall timeout of each request
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check_status(response).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn get_site(&self, site_id: &str) -> Result<Site> {
        let response = self.get(&format!("/sites/{}", site_id)).await?;
        Ok(response.json().await?)
    }
}

/// Turn non-2xx responses into [`SolarFetchError::Api`]
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!("API responded {} with body: {}", status, body);
    Err(SolarFetchError::Api {
        status: status.as_u16(),
        body,
    })
}

/// The API answers a create with the new id as plain text
async fn created_id(response: Response) -> Result<String> {
    let text = response.text().await?;
    let id = text.trim().trim_matches('"').to_string();
    if id.is_empty() {
        return Err(SolarFetchError::Parse(
            "API returned an empty identifier".to_string(),
        ));
    }
    Ok(id)
}

#[async_trait]
impl ApiSession for HttpApiSession {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        let response = self.get("/sites/").await?;
        Ok(response.json().await?)
    }

    async fn list_observations(&self) -> Result<Vec<Observation>> {
        let response = self.get("/observations/").await?;
        let wires: Vec<ObservationWire> = response.json().await?;
        let sites: HashMap<String, Site> = self
            .list_sites()
            .await?
            .into_iter()
            .map(|s| (s.site_id.clone(), s))
            .collect();

        let mut observations = Vec::with_capacity(wires.len());
        for wire in wires {
            match sites.get(&wire.site_id) {
                Some(site) => {
                    let site = site.clone();
                    observations.push(wire.into_observation(site));
                }
                None => warn!(
                    "Observation {} refers to unknown site {}, skipping",
                    wire.name, wire.site_id
                ),
            }
        }
        Ok(observations)
    }

    async fn create_site(&self, site: &Site) -> Result<Site> {
        let response = self.post("/sites/", site).await?;
        let site_id = created_id(response).await?;
        self.get_site(&site_id).await
    }

    async fn create_observation(&self, observation: &Observation) -> Result<Observation> {
        let wire = ObservationWire::from_observation(observation);
        let response = self.post("/observations/", &wire).await?;
        let observation_id = created_id(response).await?;

        let response = self
            .get(&format!("/observations/{}", observation_id))
            .await?;
        let stored: ObservationWire = response.json().await?;
        Ok(stored.into_observation(observation.site.clone()))
    }

    async fn post_observation_values(
        &self,
        observation_id: &str,
        values: &[ObservationValue],
    ) -> Result<()> {
        self.post(
            &format!("/observations/{}/values", observation_id),
            &ValuesPayload { values },
        )
        .await?;
        Ok(())
    }
}
