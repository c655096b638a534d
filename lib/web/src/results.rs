use crate::error::ServerError;
use crate::negotiation::ResponseFormat;
use anyhow::Context;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use rdf_quanta_engine::evaluate::QueryResponse;
use rdf_quanta_model::vocab::xsd;
use rdf_quanta_model::{SolutionMapping, Term, Variable};
use serde_json::{Map, Value, json};
use sparesults::{QueryResultsFormat, QueryResultsSerializer};
use std::time::Instant;

/// Response header carrying the continuation for formats whose body has
/// no extension point (the standard XML results schema).
pub const NEXT_HEADER: &str = "x-next-page";
/// Response header carrying the stats object for the same formats.
pub const STATS_HEADER: &str = "x-page-stats";

/// Encodes one result page in the negotiated format.
///
/// The export time is measured here and embedded in the page's `stats`
/// member (or header), which is why encoding consumes the response.
pub fn encode_response(
    mut page: QueryResponse,
    format: ResponseFormat,
    query: Option<&str>,
) -> Result<Response, ServerError> {
    let export_started = Instant::now();
    let body = match format {
        ResponseFormat::W3cJson => w3c_json(&mut page, export_started)?,
        ResponseFormat::W3cXml => return w3c_xml(&mut page, export_started),
        ResponseFormat::CompactJson => compact_json(&mut page, export_started)?,
        ResponseFormat::Html => html_page(&page, query),
    };
    Ok((
        [(header::CONTENT_TYPE, format.media_type())],
        body,
    )
        .into_response())
}

fn term_to_json(term: &Term) -> Value {
    match term {
        Term::NamedNode(node) => json!({"type": "uri", "value": node.as_str()}),
        Term::BlankNode(node) => json!({"type": "bnode", "value": node.as_str()}),
        Term::Literal(literal) => {
            let mut entry = Map::new();
            entry.insert("type".to_owned(), "literal".into());
            entry.insert("value".to_owned(), literal.value().into());
            if let Some(language) = literal.language() {
                entry.insert("xml:lang".to_owned(), language.into());
            } else if literal.datatype() != xsd::STRING {
                entry.insert("datatype".to_owned(), literal.datatype().as_str().into());
            }
            Value::Object(entry)
        }
        #[allow(unreachable_patterns)]
        _ => Value::Null,
    }
}

fn w3c_binding(mapping: &SolutionMapping) -> Value {
    let entries: Map<String, Value> = mapping
        .iter()
        .map(|(variable, term)| (variable.clone(), term_to_json(term)))
        .collect();
    Value::Object(entries)
}

/// The W3C results JSON document, extended with `next` and `stats`.
fn w3c_json(
    page: &mut QueryResponse,
    export_started: Instant,
) -> Result<String, ServerError> {
    let bindings: Vec<Value> = page.bindings.iter().map(w3c_binding).collect();
    page.stats.export = export_started.elapsed().as_secs_f64() * 1000.0;

    let mut document = Map::new();
    document.insert("head".to_owned(), json!({"vars": page.variables}));
    if let Some(boolean) = page.boolean {
        document.insert("boolean".to_owned(), boolean.into());
    }
    document.insert("results".to_owned(), json!({"bindings": bindings}));
    document.insert("next".to_owned(), page.next.clone().into());
    document.insert(
        "stats".to_owned(),
        serde_json::to_value(&page.stats)
            .map_err(|e| ServerError::Internal(e.into()))?,
    );
    serde_json::to_string(&Value::Object(document))
        .map_err(|e| ServerError::Internal(e.into()))
}

/// The standard W3C XML body; continuation and stats travel in headers.
fn w3c_xml(
    page: &mut QueryResponse,
    export_started: Instant,
) -> Result<Response, ServerError> {
    let serializer = QueryResultsSerializer::from_format(QueryResultsFormat::Xml);
    let mut buffer = Vec::new();
    if let Some(boolean) = page.boolean {
        serializer
            .serialize_boolean_to_writer(&mut buffer, boolean)
            .context("could not serialize the boolean result")
            .map_err(ServerError::Internal)?;
    } else {
        let variables = page
            .variables
            .iter()
            .map(|name| Variable::new(name.clone()))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid result variable")
            .map_err(ServerError::Internal)?;
        let mut solutions = serializer
            .serialize_solutions_to_writer(&mut buffer, variables.clone())
            .context("could not start the result document")
            .map_err(ServerError::Internal)?;
        for mapping in &page.bindings {
            let row = variables.iter().filter_map(|variable| {
                mapping
                    .get(variable.as_str())
                    .map(|term| (variable.as_ref(), term.as_ref()))
            });
            solutions
                .serialize(row)
                .context("could not serialize a solution")
                .map_err(ServerError::Internal)?;
        }
        solutions
            .finish()
            .context("could not finalize the result document")
            .map_err(ServerError::Internal)?;
    }
    page.stats.export = export_started.elapsed().as_secs_f64() * 1000.0;

    let mut response = (
        [(header::CONTENT_TYPE, ResponseFormat::W3cXml.media_type())],
        buffer,
    )
        .into_response();
    if let Some(next) = &page.next {
        if let Ok(value) = HeaderValue::from_str(next) {
            response.headers_mut().insert(NEXT_HEADER, value);
        }
    }
    if let Ok(stats) = serde_json::to_string(&page.stats) {
        if let Ok(value) = HeaderValue::from_str(&stats) {
            response.headers_mut().insert(STATS_HEADER, value);
        }
    }
    Ok(response)
}

/// The compact page form: `{bindings, pageSize, hasNext, next, stats}`.
fn compact_json(
    page: &mut QueryResponse,
    export_started: Instant,
) -> Result<String, ServerError> {
    let bindings: Vec<Value> = page
        .bindings
        .iter()
        .map(|mapping| {
            let entries: Map<String, Value> = mapping
                .iter()
                .map(|(variable, term)| {
                    (format!("?{variable}"), term.to_string().into())
                })
                .collect();
            Value::Object(entries)
        })
        .collect();
    page.stats.export = export_started.elapsed().as_secs_f64() * 1000.0;

    let mut document = Map::new();
    document.insert("bindings".to_owned(), Value::Array(bindings));
    document.insert("pageSize".to_owned(), page.bindings.len().into());
    document.insert("hasNext".to_owned(), page.next.is_some().into());
    document.insert("next".to_owned(), page.next.clone().into());
    if let Some(boolean) = page.boolean {
        document.insert("boolean".to_owned(), boolean.into());
    }
    document.insert(
        "stats".to_owned(),
        serde_json::to_value(&page.stats)
            .map_err(|e| ServerError::Internal(e.into()))?,
    );
    serde_json::to_string(&Value::Object(document))
        .map_err(|e| ServerError::Internal(e.into()))
}

/// A minimal human-readable page.
fn html_page(page: &QueryResponse, query: Option<&str>) -> String {
    let mut rows = String::new();
    for mapping in &page.bindings {
        rows.push_str("<tr>");
        for variable in &page.variables {
            let value = mapping
                .get(variable)
                .map(|term| escape_html(&term.to_string()))
                .unwrap_or_default();
            rows.push_str(&format!("<td>{value}</td>"));
        }
        rows.push_str("</tr>");
    }
    let header: String = page
        .variables
        .iter()
        .map(|variable| format!("<th>?{}</th>", escape_html(variable)))
        .collect();
    let next = page
        .next
        .as_ref()
        .map(|next| format!("<p>Continuation: <code>{}</code></p>", escape_html(next)))
        .unwrap_or_else(|| "<p>Query complete.</p>".to_owned());
    let query = query
        .map(|query| format!("<pre>{}</pre>", escape_html(query)))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html><head><title>RDF Quanta</title></head><body>\
         <h1>Query results</h1>{query}\
         <table border=\"1\"><thead><tr>{header}</tr></thead>\
         <tbody>{rows}</tbody></table>{next}</body></html>"
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
