//! Undercurrent worker - background processor for social content
//!
//! Runs the scheduled jobs (score recomputation, view retention, keyword
//! refresh) and consumes on-demand jobs (feed materialization) from the
//! queue. Safe to run more than one instance: schedule registration is
//! idempotent and fires dedupe at the broker.
//!
//! Usage:
//!   undercurrent-worker --mongodb-uri mongodb://localhost:27017 --nats-url nats://localhost:4222
//!
//! Configuration is environment-driven; see `config::Args` for the full set.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use undercurrent::{
    cache::MemoryListCache,
    coalescer::{BatchCoalescer, ContentUpdateHandler, OpKind},
    config::Args,
    db::schemas::{
        ContentDoc, FollowDoc, GroupMemberDoc, ViewEventDoc, CONTENT_COLLECTION,
        FOLLOW_COLLECTION, GROUP_MEMBER_COLLECTION, VIEW_EVENT_COLLECTION,
    },
    db::MongoClient,
    feed::{FeedConfig, FeedMaterializer},
    logging::EventLog,
    queue::{JobQueue, NatsJobQueue},
    retention::RetentionJob,
    scheduler::{
        JobScheduler, JobStates, ScheduleSpec, JOB_MATERIALIZE_FEED, JOB_PRUNE_VIEWS,
        JOB_RECOMPUTE_SCORES, JOB_REFRESH_KEYWORD,
    },
    scoring::ScoringEngine,
    worker::{FeedJob, KeywordRefreshJob, RetentionPassJob, ScoringPassJob, Worker, WorkerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("undercurrent={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration failures are fatal; nothing below can limp along
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Undercurrent worker");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("NATS: {}", args.nats_url);
    info!("Coalescer: max {} ops, {}ms delay", args.coalescer_config().max_operations, args.coalescer_flush_delay_ms);
    info!("Scoring: {}h lookback, {} per page", args.score_lookback_hours, args.score_batch_size);
    info!("Feed: limit {}, ttl {}s", args.feed_limit, args.feed_ttl_seconds);
    info!("======================================");

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let nats_client = match async_nats::connect(&args.nats_url).await {
        Ok(client) => client,
        Err(e) => {
            error!("NATS connection failed: {}", e);
            std::process::exit(1);
        }
    };
    let jetstream = async_nats::jetstream::new(nats_client);

    let events = match &args.event_log_path {
        Some(path) => EventLog::to_file(args.node_id.to_string(), path.clone())?,
        None => EventLog::disabled(args.node_id.to_string()),
    };

    // Collections
    let content = mongo.collection::<ContentDoc>(CONTENT_COLLECTION).await?;
    let views = mongo.collection::<ViewEventDoc>(VIEW_EVENT_COLLECTION).await?;
    let follows = mongo.collection::<FollowDoc>(FOLLOW_COLLECTION).await?;
    let members = mongo
        .collection::<GroupMemberDoc>(GROUP_MEMBER_COLLECTION)
        .await?;

    // Write path: coalescer with the content bulk-update handler. Sized to
    // hold a full scoring page so each page dispatches as one bulk call.
    let coalescer = Arc::new(
        BatchCoalescer::new(args.coalescer_config())
        .with_handler(
            OpKind::Update,
            CONTENT_COLLECTION,
            Arc::new(ContentUpdateHandler::new(content.clone())),
        )
        .with_events(events.clone()),
    );

    // Core components
    let engine = Arc::new(ScoringEngine::new(content.clone(), Arc::clone(&coalescer)));
    let retention = Arc::new(RetentionJob::new(views.clone()));
    let cache = Arc::new(MemoryListCache::new());
    let materializer = Arc::new(
        FeedMaterializer::new(
            follows,
            members,
            views,
            content,
            cache,
            FeedConfig {
                limit: args.feed_limit,
                ttl: Duration::from_secs(args.feed_ttl_seconds),
                max_age: Duration::from_secs(args.feed_max_age_days * 24 * 3600),
            },
        )
        .with_events(events.clone()),
    );

    // Queue, schedules, worker
    let queue = Arc::new(NatsJobQueue::new(jetstream.clone()).await?);
    // Acked jobs are already gone from the stream; this bounds how long an
    // unconsumed backlog can linger across worker restarts
    queue
        .purge_older_than(Duration::from_secs(args.job_max_age_hours * 3600))
        .await?;
    let states = JobStates::new();

    let scheduler = JobScheduler::new(queue, Arc::clone(&states)).await?;
    scheduler
        .register(ScheduleSpec::new(
            JOB_RECOMPUTE_SCORES,
            args.scoring_cron.clone(),
            serde_json::Value::Null,
        ))
        .await?;
    scheduler
        .register(ScheduleSpec::new(
            JOB_PRUNE_VIEWS,
            args.retention_cron.clone(),
            serde_json::Value::Null,
        ))
        .await?;
    scheduler
        .register(ScheduleSpec::new(
            JOB_REFRESH_KEYWORD,
            args.refresh_cron.clone(),
            serde_json::json!({ "keyword": args.refresh_keyword }),
        ))
        .await?;
    scheduler.start().await?;
    info!("Registered {} schedules", scheduler.registered_count());

    let worker = Worker::new(
        jetstream,
        WorkerConfig {
            worker_id: args.node_id.to_string(),
            max_concurrent: args.max_concurrent,
        },
    )
    .with_handler(
        JOB_RECOMPUTE_SCORES,
        Arc::new(ScoringPassJob::new(
            Arc::clone(&engine),
            Duration::from_secs(args.score_lookback_hours * 3600),
            args.score_batch_size,
        )),
    )
    .with_handler(
        JOB_PRUNE_VIEWS,
        Arc::new(RetentionPassJob::new(
            retention,
            Duration::from_secs(args.view_retention_days * 24 * 3600),
        )),
    )
    .with_handler(
        JOB_REFRESH_KEYWORD,
        Arc::new(KeywordRefreshJob::new(
            engine,
            args.refresh_keyword.clone(),
            args.score_batch_size,
        )),
    )
    .with_handler(JOB_MATERIALIZE_FEED, Arc::new(FeedJob::new(materializer)))
    .with_states(states)
    .with_events(events);

    let worker = Arc::new(worker);
    let runner = Arc::clone(&worker);
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            error!("Worker error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            worker.stop().await;
            // Drain anything still buffered before exiting
            coalescer.flush().await;
        }
        result = worker_handle => {
            if let Err(e) = result {
                error!("Worker task error: {}", e);
            }
        }
    }

    info!("Worker shutting down");
    Ok(())
}
