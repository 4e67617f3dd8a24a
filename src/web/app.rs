use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Error, ErrorExtensions, Schema, http::GraphiQLSource,
};
use async_graphql_poem::GraphQL;
use chrono::{Local, NaiveDateTime};
use poem::{Result, Route, Server, get, handler, listener::TcpListener, web::Html};
use tracing::info;

use crate::{
    error::EngineError,
    services::{CrowdData, CrowdStore, DataStore},
    structures::{DataCounts, LatLng, Station, TrainStatus},
    tracking::{TimelineGenerator, TrainSummary},
};

fn to_graphql(err: EngineError) -> Error {
    let code = err.code();
    Error::new(err.to_string()).extend_with(|_, e| e.set("code", code))
}

/// Request timestamps come in as `YYYY-MM-DDTHH:MM:SS`; absent means the
/// server's wall clock.
fn resolve_now(now: Option<String>) -> Result<NaiveDateTime, Error> {
    match now {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S").map_err(|_| {
            to_graphql(EngineError::InvalidInput(format!(
                "unparseable timestamp: {raw}"
            )))
        }),
        None => Ok(Local::now().naive_local()),
    }
}

pub struct QueryRoot;

#[async_graphql::Object]
impl QueryRoot {
    async fn ping(&self) -> &str {
        "pong"
    }

    /// Full derived status timeline for one train.
    async fn train_status(
        &self,
        ctx: &Context<'_>,
        train_number: String,
        now: Option<String>,
    ) -> Result<TrainStatus, Error> {
        let timeline = ctx.data::<Arc<TimelineGenerator>>()?;
        timeline
            .build_status(&train_number, resolve_now(now)?)
            .map_err(to_graphql)
    }

    /// Static route description plus current crowd counts.
    async fn train_summary(
        &self,
        ctx: &Context<'_>,
        train_number: String,
        now: Option<String>,
    ) -> Result<TrainSummary, Error> {
        let timeline = ctx.data::<Arc<TimelineGenerator>>()?;
        timeline
            .train_summary(&train_number, resolve_now(now)?)
            .map_err(to_graphql)
    }

    async fn crowd_data(
        &self,
        ctx: &Context<'_>,
        train_number: String,
        now: Option<String>,
    ) -> Result<CrowdData, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        let crowd = ctx.data::<Arc<CrowdStore>>()?;

        let snapshot = data.snapshot().map_err(to_graphql)?;
        if snapshot.schedule(&train_number).is_none() {
            return Err(to_graphql(EngineError::NotFound(train_number)));
        }
        Ok(crowd.crowd_data(&train_number, resolve_now(now)?))
    }

    async fn stations(&self, ctx: &Context<'_>) -> Result<Vec<Station>, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        let snapshot = data.snapshot().map_err(to_graphql)?;
        let mut stations: Vec<Station> = snapshot.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stations)
    }

    /// Trains calling at one station, anywhere on their route.
    async fn station_trains(
        &self,
        ctx: &Context<'_>,
        station_name: String,
        now: Option<String>,
    ) -> Result<Vec<TrainSummary>, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        let crowd = ctx.data::<Arc<CrowdStore>>()?;
        let snapshot = data.snapshot().map_err(to_graphql)?;
        let now = resolve_now(now)?;

        snapshot
            .search_by_station(&station_name)
            .iter()
            .map(|s| {
                crate::tracking::summarize(&snapshot, crowd, &s.number, now).map_err(to_graphql)
            })
            .collect()
    }

    /// Finds trains by number or name fragment, or by an ordered pair of
    /// stations on their route.
    async fn search_trains(
        &self,
        ctx: &Context<'_>,
        query: Option<String>,
        from: Option<String>,
        to: Option<String>,
        now: Option<String>,
    ) -> Result<Vec<TrainSummary>, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        let crowd = ctx.data::<Arc<CrowdStore>>()?;
        let snapshot = data.snapshot().map_err(to_graphql)?;
        let now = resolve_now(now)?;

        let matches = match (&query, &from, &to) {
            (Some(q), _, _) => snapshot.search_by_number(q),
            (None, Some(from), Some(to)) => snapshot.search_by_stations(from, to),
            _ => {
                return Err(to_graphql(EngineError::InvalidInput(
                    "provide either query, or from and to".to_string(),
                )));
            }
        };

        matches
            .iter()
            .map(|s| {
                crate::tracking::summarize(&snapshot, crowd, &s.number, now).map_err(to_graphql)
            })
            .collect()
    }
}

pub struct MutationRoot;

#[async_graphql::Object]
impl MutationRoot {
    /// Records a rider's presence on a train. One active confirmation per
    /// user; a newer one supersedes the older.
    async fn confirm(
        &self,
        ctx: &Context<'_>,
        train_number: String,
        user_id: String,
        station_name: String,
        latitude: f64,
        longitude: f64,
        now: Option<String>,
    ) -> Result<CrowdData, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        let crowd = ctx.data::<Arc<CrowdStore>>()?;

        let snapshot = data.snapshot().map_err(to_graphql)?;
        if snapshot.schedule(&train_number).is_none() {
            return Err(to_graphql(EngineError::NotFound(train_number)));
        }

        let now = resolve_now(now)?;
        crowd
            .confirm(
                &train_number,
                &user_id,
                &station_name,
                LatLng::new(latitude, longitude),
                now,
            )
            .map_err(to_graphql)?;
        Ok(crowd.crowd_data(&train_number, now))
    }

    /// Retracts a user's confirmation ahead of its expiry. The lifetime
    /// total is unaffected.
    async fn remove_confirmation(
        &self,
        ctx: &Context<'_>,
        train_number: String,
        user_id: String,
        now: Option<String>,
    ) -> Result<CrowdData, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        let crowd = ctx.data::<Arc<CrowdStore>>()?;

        let snapshot = data.snapshot().map_err(to_graphql)?;
        if snapshot.schedule(&train_number).is_none() {
            return Err(to_graphql(EngineError::NotFound(train_number)));
        }

        let now = resolve_now(now)?;
        crowd.remove(&train_number, &user_id);
        Ok(crowd.crowd_data(&train_number, now))
    }

    /// Reloads the reference data. Without `force`, a snapshot younger
    /// than the cache TTL is reused as-is.
    async fn refresh_data(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] force: bool,
    ) -> Result<DataCounts, Error> {
        let data = ctx.data::<Arc<DataStore>>()?;
        data.refresh(force).map_err(to_graphql)
    }
}

#[handler]
async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

pub type EngineSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(
    data: Arc<DataStore>,
    crowd: Arc<CrowdStore>,
    timeline: Arc<TimelineGenerator>,
) -> EngineSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .data(crowd)
        .data(timeline)
        .finish()
}

pub async fn server(
    bind: &str,
    data: Arc<DataStore>,
    crowd: Arc<CrowdStore>,
    timeline: Arc<TimelineGenerator>,
) -> std::io::Result<()> {
    let schema = build_schema(data, crowd, timeline);
    let app = Route::new()
        .at("/graphql", GraphQL::new(schema))
        .at("/graphiql", get(graphiql));

    info!(bind, "serving");
    Server::new(TcpListener::bind(bind)).run(app).await
}
