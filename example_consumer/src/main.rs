//! Example consumer: serves the resolvers of a config directory over HTTP.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Records live in memory unless `DATABASE_URL` is set.

use architect_query::config::ResolvedModel;
use architect_query::{
    common_routes, load_from_path, resolve, resolver_routes, AppState, AutoResolverConfig, BroadcastPublisher,
    DataService, MemoryDataService, PgDataService, ResolverFactory,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

fn memory_services(model: &ResolvedModel) -> HashMap<String, Arc<dyn DataService>> {
    let stores: HashMap<&str, MemoryDataService> = model
        .shapes
        .iter()
        .map(|s| (s.name.as_str(), MemoryDataService::new(s.clone())))
        .collect();
    let mut services: HashMap<String, Arc<dyn DataService>> = HashMap::new();
    for shape in &model.shapes {
        let Some(store) = stores.get(shape.name.as_str()) else { continue };
        let mut service = store.shared();
        for relation in &shape.relations {
            if let Some(target) = stores.get(relation.related.as_str()) {
                service = service.with_relation(relation.name.clone(), Arc::new(target.shared()));
            }
        }
        services.insert(shape.name.clone(), Arc::new(service));
    }
    services
}

fn pg_services(model: &ResolvedModel, pool: &sqlx::PgPool) -> HashMap<String, Arc<dyn DataService>> {
    let mut services: HashMap<String, Arc<dyn DataService>> = HashMap::new();
    for shape in &model.shapes {
        let mut service = PgDataService::new(pool.clone(), shape.clone());
        for relation in &shape.relations {
            if let Some(target) = model.shape(&relation.related) {
                let related = PgDataService::new(pool.clone(), target.clone());
                service = service.with_relation(relation.name.clone(), Arc::new(related));
            }
        }
        services.insert(shape.name.clone(), Arc::new(service));
    }
    services
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("architect_query=info,example_consumer=info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "example_consumer/config".into());
    let config = load_from_path(&config_path).await?;
    let model = resolve(&config)?;

    let services = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            tracing::info!("using PostgreSQL data services");
            pg_services(&model, &pool)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory data services");
            memory_services(&model)
        }
    };

    let publisher = Arc::new(BroadcastPublisher::default());
    let mut events = publisher.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(event = %event.name, resolver = %event.resolver, "event published");
        }
    });

    let mut factory = ResolverFactory::new().with_publisher(publisher);
    for (entity, service) in services {
        factory = factory.with_entity_service(entity, service);
    }
    let registry = if model.resolvers.is_empty() {
        let configs = model.shapes.iter().cloned().map(AutoResolverConfig::entity).collect();
        factory.create_resolvers(configs)?
    } else {
        factory.create_from_model(&model)?
    };
    tracing::info!(resolvers = ?registry.ids(), "resolvers ready");

    let state = AppState::new(registry);
    let app = common_routes(state.clone()).merge(resolver_routes(state));
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
