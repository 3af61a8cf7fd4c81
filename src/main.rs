//http服务入口
use actix_web::{web, App, HttpServer};
use router_rs::handlers::cache_handler;
use router_rs::router::controller_query::{sync_namespace, ControllerClient};
use router_rs::router::{
    FunctionReferenceResolver, InMemoryFunctionStore, NamespaceStores, RouterConfig,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RouterConfig::from_env().map_err(std::io::Error::other)?;
    let client = ControllerClient::new(
        config.controller_url.clone(),
        config.controller_token.clone(),
    )
    .map_err(std::io::Error::other)?;

    // 每个被监听的命名空间一个函数存储
    let mut stores = NamespaceStores::new();
    for namespace in &config.namespaces {
        let store = Arc::new(InMemoryFunctionStore::new(namespace));
        if let Err(e) = sync_namespace(&client, &store).await {
            log::warn!("initial sync of namespace {} failed: {}", namespace, e);
        }
        stores.insert(namespace, store);
    }

    let resolver = web::Data::new(FunctionReferenceResolver::new(
        stores,
        config.resolver.clone(),
    ));

    log::info!(
        "router listening on {}, cache ttl {:?}",
        config.listen_addr,
        config.resolver.cache_ttl
    );
    HttpServer::new(move || {
        App::new()
            .app_data(resolver.clone())
            .configure(cache_handler::configure)
    })
    .bind(&config.listen_addr)? //监听地址
    .run()
    .await
}
