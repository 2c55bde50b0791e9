use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::{AttributeName, DatasetName};
use crate::error::KiraError;
use crate::table::Table;

const COMPLETION_STAMP: &str = "[success]";

/// Gene annotation source. `query` returns one row per gene record and one
/// column per requested attribute, named after the attribute, in request
/// order. Duplicate rows and null cells are passed through.
pub trait BiomartClient: Send + Sync {
    fn query(&self, dataset: &DatasetName, attributes: &[AttributeName])
    -> Result<Table, KiraError>;
}

#[derive(Clone)]
pub struct BiomartHttpClient {
    client: Client,
    service_url: String,
}

impl BiomartHttpClient {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-ortho/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::BiomartHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::BiomartHttp(err.to_string()))?;
        Ok(Self {
            client,
            service_url: service_url(host),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }
}

impl BiomartClient for BiomartHttpClient {
    fn query(
        &self,
        dataset: &DatasetName,
        attributes: &[AttributeName],
    ) -> Result<Table, KiraError> {
        let xml = build_query_xml(dataset, attributes);
        let start = Instant::now();
        let response = self
            .client
            .get(&self.service_url)
            .query(&[("query", xml.as_str())])
            .send()
            .map_err(|err| KiraError::BiomartHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "BioMart request failed".to_string());
            return Err(KiraError::BiomartStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| KiraError::BiomartHttp(err.to_string()))?;
        debug!(
            dataset = %dataset,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "biomart response"
        );
        parse_response(dataset, attributes, &body)
    }
}

pub fn service_url(host: &str) -> String {
    format!("{}/biomart/martservice", host.trim_end_matches('/'))
}

pub fn build_query_xml(dataset: &DatasetName, attributes: &[AttributeName]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><!DOCTYPE Query>\
         <Query virtualSchemaName=\"default\" formatter=\"TSV\" header=\"0\" \
         uniqueRows=\"1\" datasetConfigVersion=\"0.6\" completionStamp=\"1\">",
    );
    xml.push_str(&format!(
        "<Dataset name=\"{}\" interface=\"default\">",
        dataset.as_str()
    ));
    for attribute in attributes {
        xml.push_str(&format!("<Attribute name=\"{}\"/>", attribute.as_str()));
    }
    xml.push_str("</Dataset></Query>");
    xml
}

/// Turns a martservice TSV body into a table.
///
/// BioMart reports unknown datasets and attributes in a 200 response body,
/// so those are detected here. A body without the completion stamp was cut
/// off in transit.
pub fn parse_response(
    dataset: &DatasetName,
    attributes: &[AttributeName],
    body: &str,
) -> Result<Table, KiraError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with("Query ERROR") || trimmed.contains("BioMart::Exception") {
        return Err(KiraError::BiomartQuery {
            dataset: dataset.to_string(),
            message: trimmed.lines().next().unwrap_or_default().to_string(),
        });
    }

    let content = body.trim_end_matches(['\n', '\r']);
    let Some(content) = content.strip_suffix(COMPLETION_STAMP) else {
        return Err(KiraError::BiomartHttp(format!(
            "incomplete response for {dataset}"
        )));
    };

    let columns = attributes
        .iter()
        .map(|attribute| attribute.as_str().to_string())
        .collect::<Vec<_>>();
    Table::read_tsv_with_columns(columns, content.as_bytes()).map_err(|err| match err {
        KiraError::ColumnCountMismatch { expected, found } => KiraError::BiomartQuery {
            dataset: dataset.to_string(),
            message: format!("expected {expected} attributes per row, got {found}"),
        },
        other => other,
    })
}
