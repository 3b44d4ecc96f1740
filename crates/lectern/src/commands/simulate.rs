//! Simulate command - drive a classroom workload through the core.

use anyhow::Result;
use clap::Args;
use lectern_cache::{SetOptions, TieredSetOptions, TieredStats};
use lectern_session::{NewParticipant, RegistryStats, SessionOptions, SessionStatus};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::Context;
use crate::services::Services;

/// Case briefs cached during the run, keyed for similarity lookups.
const CASES: &[&str] = &[
    "case:contract-breach-damages",
    "case:contract-offer-acceptance",
    "case:negligence-duty-of-care",
    "case:negligence-causation",
    "case:property-adverse-possession",
    "case:criminal-mens-rea",
];

const QUESTIONS: &[&str] = &[
    "Was there a valid offer?",
    "Did the defendant owe a duty of care?",
    "What remedy fits this breach?",
];

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of sessions to create
    #[arg(long, default_value_t = 3)]
    pub sessions: usize,

    /// Participants joining each session
    #[arg(long, default_value_t = 20)]
    pub participants: usize,

    /// Query used for the similarity lookup
    #[arg(long, default_value = "contract breach")]
    pub query: String,
}

/// What the run did and what the components report afterwards.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub sessions_created: usize,
    pub sessions_rejected: usize,
    pub participants_joined: usize,
    pub participants_rejected: usize,
    pub sessions_ended: usize,
    pub similar_cases: Vec<SimilarCase>,
    pub registry: RegistryStats,
    pub cache: TieredStats,
}

#[derive(Debug, Serialize)]
pub struct SimilarCase {
    pub key: String,
    pub similarity: f64,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let services = Services::init(&ctx.loaded.config).await;
    let report = drive(&services, &args).await;
    services.stop().await?;

    let report = report?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, ctx.verbose);
    }
    Ok(())
}

async fn drive(services: &Services, args: &SimulateArgs) -> Result<SimulationReport> {
    let registry = &services.registry;
    let cache = &services.cache;

    for case in CASES {
        cache
            .set(
                case,
                json!({ "title": case.trim_start_matches("case:") }),
                TieredSetOptions::default(),
            )
            .await?;
    }

    let mut codes = Vec::new();
    let mut sessions_rejected = 0;
    for s in 0..args.sessions {
        let options = SessionOptions::new()
            .with_owner(format!("instructor-{s}"))
            .with_title(format!("Section {s}"));
        match registry.create(options) {
            Ok(session) => codes.push(session.code),
            Err(e) => {
                debug!(error = %e, "Session not created");
                sessions_rejected += 1;
            }
        }
    }

    let mut participants_joined = 0;
    let mut participants_rejected = 0;
    for (s, code) in codes.iter().enumerate() {
        for p in 0..args.participants {
            let id = format!("student-{p}");
            match registry.add_participant(code, &id, NewParticipant::named(&id)) {
                Ok(_) => participants_joined += 1,
                Err(e) => {
                    debug!(code = %code, participant = %id, error = %e, "Join rejected");
                    participants_rejected += 1;
                }
            }
        }

        registry.set_question(code, QUESTIONS[s % QUESTIONS.len()])?;
        registry.set_vote(code, json!({ "options": ["yes", "no", "unsure"] }))?;

        let session = registry.get_by_code(code)?;
        cache
            .set(
                &format!("session:{code}:stats"),
                serde_json::to_value(&session.statistics)?,
                TieredSetOptions::default(),
            )
            .await?;

        // Every third participant drops off, every other one idles.
        for id in session.participants.keys() {
            let n: usize = id
                .trim_start_matches("student-")
                .parse()
                .unwrap_or_default();
            if n % 3 == 0 {
                registry.remove_participant(code, id)?;
            } else if n % 2 == 0 {
                registry.mark_offline(code, id)?;
            }
        }
    }

    // Read the briefs back twice; the second pass is all Tier-1 hits.
    for _ in 0..2 {
        for case in CASES {
            cache.get(case).await;
        }
    }
    cache.get("case:unknown").await;

    services
        .tier1
        .set("note:draft", json!("scratch"), SetOptions::default().with_tag("draft"));
    services.tier1.invalidate_tag("draft");

    let similar_cases = services
        .tier1
        .find_similar(&args.query, 0.2)
        .into_iter()
        .map(|m| SimilarCase {
            key: m.key,
            similarity: m.similarity,
        })
        .collect();

    let mut sessions_ended = 0;
    if let Some(code) = codes.last()
        && registry.update_status(code, SessionStatus::Ended)?
    {
        sessions_ended += 1;
    }

    let report = SimulationReport {
        sessions_created: codes.len(),
        sessions_rejected,
        participants_joined,
        participants_rejected,
        sessions_ended,
        similar_cases,
        registry: registry.stats(),
        cache: cache.stats().await,
    };
    info!(
        sessions = report.sessions_created,
        participants = report.participants_joined,
        hit_rate = report.cache.overall_hit_rate,
        "Simulation finished"
    );
    Ok(report)
}

fn print_report(report: &SimulationReport, verbose: bool) {
    println!("Sessions");
    println!(
        "  created: {}  rejected: {}  ended: {}",
        report.sessions_created, report.sessions_rejected, report.sessions_ended
    );
    println!(
        "  participants joined: {}  rejected: {}",
        report.participants_joined, report.participants_rejected
    );
    println!(
        "  live: {}  participants held: {}  online: {}",
        report.registry.active_sessions,
        report.registry.total_participants,
        report.registry.online_participants
    );
    println!();

    println!("Cache");
    println!(
        "  requests: {}  tier-1 hits: {}  tier-2 hits: {}  misses: {}",
        report.cache.total_requests,
        report.cache.tier1_hits,
        report.cache.tier2_hits,
        report.cache.misses
    );
    println!("  hit rate: {:.1}%", report.cache.overall_hit_rate * 100.0);
    if verbose {
        for tier in [&report.cache.tier1, &report.cache.tier2].into_iter().flatten() {
            println!(
                "  {:<8} {} / {} entries",
                tier.name, tier.entries, tier.capacity
            );
        }
    }
    println!();

    if report.similar_cases.is_empty() {
        println!("No similar cases");
    } else {
        println!("Similar cases");
        for case in &report.similar_cases {
            println!("  {:.2}  {}", case.similarity, case.key);
        }
    }
}
