//! ProbMatch session simulator.
//!
//! Plays one or more synthetic participants against the server: `Start`, a
//! random number of `ButtonPress` events with a random side and random pauses,
//! then `End`.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use mindcraft_core::events::NewEvent;
use rand::Rng;
use serde_json::json;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct SimulateArgs {
    /// Experiment name
    #[arg(short, long, default_value = "ProbMatch")]
    experiment: String,

    /// Subject of the first session; random when omitted
    #[arg(short, long)]
    subject: Option<i64>,

    /// Number of sessions, run one after another with consecutive subjects
    #[arg(short = 'n', long, default_value = "1")]
    sessions: u32,

    /// Fewest button presses per session
    #[arg(long, default_value = "25")]
    min_presses: u32,

    /// Most button presses per session
    #[arg(long, default_value = "49")]
    max_presses: u32,

    /// Longest pause before a press, in milliseconds
    #[arg(long, default_value = "4000")]
    max_delay_ms: u64,
}

/// One step of a session: wait, then send.
#[derive(Debug)]
struct Step {
    delay: Duration,
    event: NewEvent,
}

fn plan_session<R: Rng>(rng: &mut R, args: &SimulateArgs, subject: i64) -> Vec<Step> {
    let presses = rng.gen_range(args.min_presses..=args.max_presses);
    let mut steps = Vec::with_capacity(presses as usize + 2);

    steps.push(Step {
        delay: Duration::ZERO,
        event: NewEvent::new(&args.experiment, subject, "Start"),
    });
    for _ in 0..presses {
        let left: bool = rng.gen();
        steps.push(Step {
            delay: Duration::from_millis(rng.gen_range(0..=args.max_delay_ms)),
            event: NewEvent::new(&args.experiment, subject, "ButtonPress")
                .with_args(json!({ "left": left })),
        });
    }
    steps.push(Step {
        delay: Duration::ZERO,
        event: NewEvent::new(&args.experiment, subject, "End"),
    });

    steps
}

/// Consecutive subjects for `sessions` runs starting at `first`.
fn session_subjects(first: i64, sessions: u32) -> Result<Vec<i64>> {
    (0..sessions)
        .map(|session| {
            first.checked_add(i64::from(session)).ok_or_else(|| {
                anyhow::anyhow!("--subject {} leaves no room for {} sessions", first, sessions)
            })
        })
        .collect()
}

pub async fn execute(args: SimulateArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    if args.min_presses > args.max_presses {
        bail!("--min-presses must not exceed --max-presses");
    }

    let first = args
        .subject
        .unwrap_or_else(|| rand::thread_rng().gen_range(1_000..1_000_000));

    let subjects = session_subjects(first, args.sessions)?;

    let mut saved = Vec::new();
    for subject in subjects {
        let steps = plan_session(&mut rand::thread_rng(), &args, subject);
        if format == OutputFormat::Table {
            output::print_info(&format!(
                "Subject {}: sending {} events to {}",
                subject,
                steps.len(),
                args.experiment
            ));
        }

        for step in steps {
            tokio::time::sleep(step.delay).await;
            let event = client.save(&step.event).await?;
            tracing::debug!(subject = %event.subject, event = %event.event, "Simulated event saved");
            saved.push(event);
        }
    }

    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Simulated {} session(s)", args.sessions));
            Ok(())
        }
        _ => output::print_item(&saved, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(min: u32, max: u32, delay: u64) -> SimulateArgs {
        SimulateArgs {
            experiment: "ProbMatch".into(),
            subject: Some(5),
            sessions: 1,
            min_presses: min,
            max_presses: max,
            max_delay_ms: delay,
        }
    }

    #[test]
    fn test_session_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let steps = plan_session(&mut rng, &args(25, 49, 4000), 5);

        let kinds: Vec<&str> = steps
            .iter()
            .map(|s| s.event.event.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(kinds.first(), Some(&"Start"));
        assert_eq!(kinds.last(), Some(&"End"));

        let presses = kinds.iter().filter(|k| **k == "ButtonPress").count();
        assert!((25..=49).contains(&presses));
        assert_eq!(presses + 2, steps.len());

        for step in &steps {
            assert!(step.delay <= Duration::from_millis(4000));
            assert_eq!(step.event.subject, Some(json!(5)));
        }
        assert!(steps[1].event.args.as_ref().unwrap()["left"].is_boolean());
    }

    #[test]
    fn test_session_subjects_are_consecutive() {
        assert_eq!(session_subjects(5, 3).unwrap(), vec![5, 6, 7]);
        assert_eq!(session_subjects(i64::MAX, 1).unwrap(), vec![i64::MAX]);
        assert!(session_subjects(i64::MAX - 1, 3).is_err());
    }

    #[tokio::test]
    async fn test_subject_overflow_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut overflowing = args(1, 1, 0);
        overflowing.subject = Some(i64::MAX);
        overflowing.sessions = 2;

        let client = ApiClient::new(&server.uri()).unwrap();
        assert!(execute(overflowing, &client, OutputFormat::Json).await.is_err());
    }

    #[tokio::test]
    async fn test_simulate_posts_every_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/save"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"experiment": "ProbMatch", "subject": 5, "event": "Start", "time": 1}
            })))
            .expect(4)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        execute(args(2, 2, 0), &client, OutputFormat::Json).await.unwrap();
    }
}
