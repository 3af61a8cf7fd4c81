//解析缓存的诊断接口
// cache_handler.rs
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::router::{FunctionReferenceResolver, ResolveKey, ResolveResult};

#[derive(Debug, Serialize)]
pub struct CacheEntryView {
    pub key: ResolveKey,
    pub result: ResolveResult,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/debug/resolver/cache").route(web::get().to(list_cache_entries)),
    )
    .service(
        web::resource("/debug/resolver/cache/{namespace}/{trigger}/{version}")
            .route(web::delete().to(delete_cache_entry)),
    );
}

pub async fn list_cache_entries(resolver: web::Data<FunctionReferenceResolver>) -> impl Responder {
    let mut entries: Vec<CacheEntryView> = resolver
        .snapshot()
        .into_iter()
        .map(|(key, result)| CacheEntryView { key, result })
        .collect();
    // 输出顺序固定，方便对比
    entries.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
    HttpResponse::Ok().json(entries)
}

pub async fn delete_cache_entry(
    resolver: web::Data<FunctionReferenceResolver>,
    path: web::Path<(String, String, String)>,
) -> impl Responder {
    let (namespace, trigger, version) = path.into_inner();
    let removed = resolver.delete(&namespace, &trigger, &version);
    log::info!(
        "cache delete requested for {}/{}@{}, removed: {}",
        namespace,
        trigger,
        version,
        removed
    );
    HttpResponse::Ok().json(serde_json::json!({ "removed": removed }))
}
