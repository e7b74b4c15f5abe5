use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use survey_session::{
    CompletionStatus, ControllerError, ControllerOptions, FormController, HandlerError,
    HandlerResult, SubmitOutcome,
};
use survey_spec::{AnswerSet, SurveyDefinition};
use tokio::time::{Instant, sleep};

const FINANCING: &str = include_str!("../../survey-spec/tests/fixtures/financing_survey.json");
const BRANCHING: &str = include_str!("../../survey-spec/tests/fixtures/branching.json");

/// Partial-save collaborator that records when each save started.
#[derive(Clone, Default)]
struct SaveLog {
    started: Arc<Mutex<Vec<Instant>>>,
    stored: Arc<Mutex<Vec<AnswerSet>>>,
    failures_left: Arc<AtomicUsize>,
}

impl SaveLog {
    fn failing(times: usize) -> Self {
        let log = Self::default();
        log.failures_left.store(times, Ordering::SeqCst);
        log
    }

    fn starts(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    fn stored(&self) -> Vec<AnswerSet> {
        self.stored.lock().unwrap().clone()
    }

    fn saver(
        &self,
        duration: Duration,
    ) -> impl Fn(AnswerSet) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static {
        let log = self.clone();
        move |answers: AnswerSet| -> BoxFuture<'static, HandlerResult> {
            let log = log.clone();
            Box::pin(async move {
                log.started.lock().unwrap().push(Instant::now());
                sleep(duration).await;
                let failing = log
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if failing {
                    return Err::<(), HandlerError>("storage offline".into());
                }
                log.stored.lock().unwrap().push(answers);
                Ok(())
            })
        }
    }
}

async fn accept(_answers: AnswerSet, _status: CompletionStatus) -> HandlerResult {
    Ok(())
}

fn controller(raw: &str, log: &SaveLog, save_duration: Duration) -> FormController {
    let definition: SurveyDefinition = serde_json::from_str(raw).expect("fixture");
    FormController::new(definition, accept)
        .unwrap()
        .with_partial_save(log.saver(save_duration))
}

#[tokio::test(start_paused = true)]
async fn saves_latest_answers_every_interval() {
    let log = SaveLog::default();
    let mut form = controller(FINANCING, &log, Duration::from_millis(10));
    form.set_answer("company_name", "Acme Oy").unwrap();
    assert!(form.start_autosave().unwrap());

    sleep(Duration::from_secs(29)).await;
    assert_eq!(log.starts(), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(log.starts(), 1);

    form.set_answer("contact_email", "cfo@acme.fi").unwrap();
    sleep(Duration::from_secs(30)).await;
    let stored = log.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].len(), 1);
    assert_eq!(stored[1].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn custom_interval_is_honoured() {
    let log = SaveLog::default();
    let mut form = controller(FINANCING, &log, Duration::from_millis(10)).with_options(
        ControllerOptions {
            autosave_interval: Duration::from_secs(5),
        },
    );
    form.set_answer("company_name", "Acme Oy").unwrap();
    form.start_autosave().unwrap();

    sleep(Duration::from_secs(21)).await;
    assert_eq!(log.starts(), 4);
}

#[tokio::test(start_paused = true)]
async fn skips_ticks_while_answers_are_empty() {
    let log = SaveLog::default();
    let mut form = controller(FINANCING, &log, Duration::from_millis(10));
    form.start_autosave().unwrap();

    sleep(Duration::from_secs(65)).await;
    assert_eq!(log.starts(), 0);

    form.set_answer("company_name", "Acme Oy").unwrap();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(log.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_save_suppresses_overlapping_ticks() {
    let log = SaveLog::default();
    let mut form = controller(FINANCING, &log, Duration::from_secs(45));
    form.set_answer("company_name", "Acme Oy").unwrap();
    form.start_autosave().unwrap();

    sleep(Duration::from_secs(40)).await;
    assert!(form.is_autosaving());

    sleep(Duration::from_secs(60)).await;
    let started = log.started.lock().unwrap().clone();
    assert_eq!(started.len(), 2);
    assert_eq!(started[1] - started[0], Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn failed_save_is_retried_next_tick() {
    let log = SaveLog::failing(1);
    let mut form = controller(FINANCING, &log, Duration::from_millis(10));
    form.set_answer("company_name", "Acme Oy").unwrap();
    form.start_autosave().unwrap();

    sleep(Duration::from_secs(31)).await;
    assert_eq!(log.starts(), 1);
    assert!(log.stored().is_empty());
    assert!(!form.is_autosaving());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(log.starts(), 2);
    assert_eq!(log.stored().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopping_or_submitting_ends_autosave() {
    let log = SaveLog::default();
    let mut form = controller(FINANCING, &log, Duration::from_millis(10));
    form.set_answer("company_name", "Acme Oy").unwrap();
    form.start_autosave().unwrap();
    sleep(Duration::from_secs(31)).await;
    form.stop_autosave();
    sleep(Duration::from_secs(120)).await;
    assert_eq!(log.starts(), 1);

    let log = SaveLog::default();
    let mut form = controller(BRANCHING, &log, Duration::from_millis(10));
    form.set_answer("q1", "no").unwrap();
    form.start_autosave().unwrap();
    assert_eq!(form.submit().await.unwrap(), SubmitOutcome::Submitted);
    sleep(Duration::from_secs(120)).await;
    assert_eq!(log.starts(), 0);
    assert!(matches!(
        form.start_autosave(),
        Err(ControllerError::AlreadySubmitted)
    ));
}

#[tokio::test(start_paused = true)]
async fn disabled_when_partial_saves_are_off() {
    let log = SaveLog::default();
    let mut definition: SurveyDefinition = serde_json::from_str(FINANCING).unwrap();
    definition.settings.save_partial = false;
    let mut form = FormController::new(definition, accept)
        .unwrap()
        .with_partial_save(log.saver(Duration::from_millis(10)));
    form.set_answer("company_name", "Acme Oy").unwrap();

    assert!(!form.autosave_enabled());
    assert!(!form.start_autosave().unwrap());
    sleep(Duration::from_secs(120)).await;
    assert_eq!(log.starts(), 0);
}

#[test]
fn requires_a_runtime() {
    let log = SaveLog::default();
    let mut form = controller(FINANCING, &log, Duration::from_millis(10));
    assert!(matches!(
        form.start_autosave(),
        Err(ControllerError::NoRuntime)
    ));
}
