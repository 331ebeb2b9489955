//! Admin views.

use serde_json::{Map, Value, json};
use tool_core::types::Method;
use tool_core::{Pagination, RequestContext, Route, RouteArgs, Routes};
use tool_documents::{DocumentStore, default_storage};
use tool_shared::{DocumentId, Result, ToolError};
use tool_templating::{Page, as_html};
use tracing::info;

use crate::bundle::BUNDLE_NAME;
use crate::registry::{AdminRegistry, ModelAdmin};

pub const PER_PAGE: u64 = 20;

/// The admin URL map, namespaced as `admin`.
pub fn routes() -> Routes {
    Routes::namespaced(BUNDLE_NAME)
        .route(Route::new("index", as_html("admin/index.html", index)).url("/"))
        .route(
            Route::new("namespace", as_html("admin/namespace.html", namespace))
                .url("/<namespace>/"),
        )
        .route(
            Route::new("object_list", as_html("admin/object_list.html", object_list))
                .url("/<namespace>/<model_name>/"),
        )
        .route(
            Route::new("object_add", as_html("admin/object_detail.html", object_add))
                .url_with_methods("/<namespace>/<model_name>/add", &[Method::GET, Method::POST]),
        )
        .route(
            Route::new("object_detail", as_html("admin/object_detail.html", object_detail))
                .url_with_methods(
                    "/<namespace>/<model_name>/<uuid:pk>",
                    &[Method::GET, Method::POST],
                ),
        )
}

fn registry(cx: &RequestContext) -> Result<&AdminRegistry> {
    cx.require::<AdminRegistry>(BUNDLE_NAME)
}

fn str_arg(cx: &RequestContext, name: &str) -> String {
    cx.args().get_str(name).unwrap_or_default().to_string()
}

fn model_args(namespace: &str, model: &str) -> RouteArgs {
    RouteArgs::new()
        .with("namespace", namespace)
        .with("model_name", model)
}

async fn index(cx: RequestContext) -> Result<Page> {
    let namespaces: Map<String, Value> = registry(&cx)?
        .namespaces()
        .iter()
        .map(|(name, models)| (name.clone(), json!(models.keys().collect::<Vec<_>>())))
        .collect();
    Page::context(json!({ "namespaces": namespaces }))
}

async fn namespace(cx: RequestContext) -> Result<Page> {
    let namespace = str_arg(&cx, "namespace");
    let models: Vec<&String> = registry(&cx)?.namespace(&namespace)?.keys().collect();
    Page::context(json!({ "namespace": namespace, "models": models }))
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

async fn object_list(cx: RequestContext) -> Result<Page> {
    let namespace = str_arg(&cx, "namespace");
    let model_name = str_arg(&cx, "model_name");
    let model = registry(&cx)?.model(&namespace, &model_name)?;
    let store = default_storage(cx.app().context())?;
    let request = cx.request();

    let (ordering, reverse) = match request.value("sort_by") {
        Some(field) => (
            vec![field],
            request
                .value("sort_reverse")
                .is_some_and(|v| !v.is_empty() && v != "0"),
        ),
        None => (model.options.ordering.clone(), model.options.ordering_reversed),
    };
    let page = parse_number(request.value("page"), "page", 1)?;
    let per_page = parse_number(request.value("per_page"), "per_page", PER_PAGE)?;

    let fields: Vec<&str> = ordering.iter().map(String::as_str).collect();
    let query = store.raw_query(model.collection).order_by(&fields, reverse);
    let count = query.count().await.map_err(bad_request)?;

    let mut args = model_args(&namespace, &model_name);
    if per_page != PER_PAGE {
        args.insert("per_page", i64::try_from(per_page).unwrap_or(i64::MAX));
    }
    let pagination = Pagination::new(count, per_page, page, "admin.object_list")
        .map_err(bad_request)?
        .with_args(args);
    let rows = query
        .offset(pagination.offset())
        .limit(pagination.limit())
        .all()
        .await?;

    let objects: Vec<Value> = rows
        .iter()
        .map(|(pk, data)| {
            let columns: Vec<String> = if model.options.list_names.is_empty() {
                vec![model.label(data)]
            } else {
                model
                    .options
                    .list_names
                    .iter()
                    .map(|name| display(data.get(name)))
                    .collect()
            };
            json!({ "pk": pk, "columns": columns })
        })
        .collect();

    let list_names = if model.options.list_names.is_empty() {
        vec![model.name.clone()]
    } else {
        model.options.list_names.clone()
    };

    Page::context(json!({
        "namespace": namespace,
        "model_name": model_name,
        "list_names": list_names,
        "objects": objects,
        "pagination": pagination.links(&cx),
    }))
}

fn parse_number(value: Option<String>, name: &str, default: u64) -> Result<u64> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .ok()
            .filter(|n: &u64| *n >= 1)
            .ok_or_else(|| ToolError::http(400, format!("{name} must be a positive number"))),
    }
}

/// Invalid listing parameters are the client's fault.
fn bad_request(e: ToolError) -> ToolError {
    match e {
        ToolError::Validation { .. } => ToolError::http(400, e.to_string()),
        other => other,
    }
}

async fn object_add(cx: RequestContext) -> Result<Page> {
    edit(cx, None).await
}

async fn object_detail(cx: RequestContext) -> Result<Page> {
    let pk: DocumentId = str_arg(&cx, "pk").parse().map_err(|_| ToolError::not_found())?;
    edit(cx, Some(pk)).await
}

/// Shows, saves or deletes one document. The form carries the document
/// fields (minus excluded ones) as a JSON object in `data`.
async fn edit(cx: RequestContext, pk: Option<DocumentId>) -> Result<Page> {
    let namespace = str_arg(&cx, "namespace");
    let model_name = str_arg(&cx, "model_name");
    let model = registry(&cx)?.model(&namespace, &model_name)?;
    let store = default_storage(cx.app().context())?;
    let request = cx.request();

    let stored = match &pk {
        Some(pk) => Some(
            store
                .get_raw(model.collection, pk)
                .await?
                .ok_or_else(ToolError::not_found)?,
        ),
        None => None,
    };

    if *request.method() == Method::POST {
        if let Some(pk) = &pk {
            if request.form_value("DELETE").is_some_and(|v| !v.is_empty()) {
                store.delete_raw(model.collection, pk).await?;
                info!(collection = model.collection, %pk, "deleted through admin");
                return Ok(cx
                    .redirect_to(".object_list", &model_args(&namespace, &model_name))?
                    .into());
            }
        }

        let submitted = request.form_value("data").unwrap_or_default();
        match save(store, model, pk, stored.as_ref(), &submitted).await {
            Ok(pk) => {
                let args = model_args(&namespace, &model_name).with("pk", pk.to_string());
                return Ok(cx.redirect_to(".object_detail", &args)?.into());
            }
            Err(e @ ToolError::Validation { .. }) => {
                return detail_page(model, &namespace, pk, &submitted, Some(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    let data = stored.map(|data| visible_fields(model, data)).unwrap_or_else(|| json!({}));
    let text = serde_json::to_string_pretty(&data)?;
    detail_page(model, &namespace, pk, &text, None)
}

async fn save(
    store: &DocumentStore,
    model: &ModelAdmin,
    pk: Option<DocumentId>,
    stored: Option<&Value>,
    submitted: &str,
) -> Result<DocumentId> {
    let mut data: Value = serde_json::from_str(submitted)
        .map_err(|e| ToolError::validation(format!("data is not valid JSON: {e}")))?;
    let Value::Object(fields) = &mut data else {
        return Err(ToolError::validation("data must be a JSON object"));
    };
    fields.remove("pk");
    // excluded fields are not editable, keep the stored values
    for name in &model.options.exclude {
        match stored.and_then(|s| s.get(name)) {
            Some(value) => fields.insert(name.clone(), value.clone()),
            None => fields.remove(name),
        };
    }
    let data = model.normalize(data)?;
    let pk = match pk {
        Some(pk) => {
            store.put_raw(model.collection, &pk, &data).await?;
            pk
        }
        None => store.insert_raw(model.collection, &data).await?,
    };
    info!(collection = model.collection, %pk, "saved through admin");
    Ok(pk)
}

fn visible_fields(model: &ModelAdmin, mut data: Value) -> Value {
    if let Value::Object(fields) = &mut data {
        for name in &model.options.exclude {
            fields.remove(name);
        }
    }
    data
}

fn detail_page(
    model: &ModelAdmin,
    namespace: &str,
    pk: Option<DocumentId>,
    data: &str,
    message: Option<String>,
) -> Result<Page> {
    let title = match pk {
        Some(_) => format!("Editing {}", model.name),
        None => format!("Adding {}", model.name),
    };
    Page::context(json!({
        "title": title,
        "namespace": namespace,
        "model_name": model.name,
        "pk": pk,
        "data": data,
        "message": message,
    }))
}
