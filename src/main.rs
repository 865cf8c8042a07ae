use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};

use bookflow::availability::InMemoryAvailability;
use bookflow::config::WizardConfig;
use bookflow::error::Error;
use bookflow::form::FormState;
use bookflow::nav::NavTarget;
use bookflow::scheduling::{AvailabilityDay, Company, Slot};
use bookflow::session::{SessionEvent, WizardSession};
use bookflow::steps::{ChoiceOption, Dependency, StepDefinition, StepGraph, StepKind};
use bookflow::validation::FieldFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("📅 Bookflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Type an answer and press Enter. /back, /reset, /quit.\n");

    let graph = Arc::new(demo_graph()?);
    let companies = demo_companies();
    let provider = Arc::new(demo_availability(&companies));

    // Deep-link support: BOOKFLOW_CATEGORY pre-seeds the branch choice the
    // way a campaign link parameter would.
    let mut form = FormState::new();
    if let Ok(category) = std::env::var("BOOKFLOW_CATEGORY") {
        eprintln!("   Deep link: category={category}\n");
        form.commit("category", category);
    }

    let mut session =
        WizardSession::with_form(WizardConfig::default(), graph, provider, form);
    let mut events = session.subscribe();
    session.start();

    let today = Utc::now().date_naive();
    let company_ids: Vec<String> = companies.iter().map(|c| c.id.clone()).collect();

    render_step(&mut session, &companies);

    let stdin = tokio::io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        let input = line.trim().to_string();
        if input.is_empty() {
            eprint!("> ");
            continue;
        }

        match input.as_str() {
            "/quit" | "/exit" => break,
            "/back" => {
                if session.retreat() == NavTarget::Exit {
                    eprintln!("Left the wizard.");
                    break;
                }
            }
            "/reset" => {
                session.reset();
            }
            _ => {
                if let Err(e) =
                    handle_input(&mut session, &input, &company_ids, today).await
                {
                    eprintln!("⚠️  {e}");
                }
            }
        }

        drain_events(&mut events);
        render_step(&mut session, &companies);
        eprint!("> ");
    }

    Ok(())
}

/// Apply one line of user input to the current step.
async fn handle_input(
    session: &mut WizardSession,
    input: &str,
    company_ids: &[String],
    today: NaiveDate,
) -> Result<(), Error> {
    let step = session.nav().current_step().clone();
    match step.kind {
        StepKind::Choice => {
            let picked = step
                .options
                .iter()
                .find(|o| o.value.eq_ignore_ascii_case(input) || o.label.eq_ignore_ascii_case(input))
                .map(|o| o.value.clone());
            match picked {
                Some(value) => {
                    session.commit(&step.id, value)?;
                    session.advance()?;
                }
                None => eprintln!("Pick one of the listed options."),
            }
        }
        StepKind::Text | StepKind::Form => {
            session.commit(&step.id, input)?;
            session.advance()?;
        }
        StepKind::DateTime => {
            handle_scheduling_input(session, input, company_ids, today).await?;
        }
        StepKind::Summary => {
            if input.eq_ignore_ascii_case("submit") {
                let payload = session.submit()?;
                match serde_json::to_string_pretty(&payload) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!("Failed to serialize payload: {e}"),
                }
                eprintln!("✅ Request sent. /reset to start over.");
            } else {
                eprintln!("Type 'submit' to send your request, or /back to change something.");
            }
        }
    }
    Ok(())
}

/// Scheduling-step commands: `pick <company> <date> <time>`,
/// `drop <company> <date> <time>`, `next`.
async fn handle_scheduling_input(
    session: &mut WizardSession,
    input: &str,
    company_ids: &[String],
    today: NaiveDate,
) -> Result<(), Error> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    match parts.as_slice() {
        ["load"] => {
            session
                .load_availability(company_ids, today, today + ChronoDuration::days(13))
                .await;
        }
        ["pick", company, date, time] => match date.parse::<NaiveDate>() {
            Ok(date) => {
                session.select_slot(company, date, time)?;
            }
            Err(_) => eprintln!("Dates look like 2025-03-10."),
        },
        ["drop", company, date, time] => match date.parse::<NaiveDate>() {
            Ok(date) => {
                if !session.deselect_slot(company, date, time) {
                    eprintln!("No such appointment held.");
                }
            }
            Err(_) => eprintln!("Dates look like 2025-03-10."),
        },
        ["next"] => {
            session.advance()?;
        }
        _ => {
            eprintln!("Commands: load · pick <company> <date> <time> · drop <company> <date> <time> · next");
        }
    }
    Ok(())
}

/// Paint the current step from session snapshots.
fn render_step(session: &mut WizardSession, companies: &[Company]) {
    let step = session.nav().current_step().clone();
    let prompt = step.render_prompt(session.nav().form());
    let progress = session.progress();

    eprintln!("\n── {} ({progress:.0}%)", prompt);
    match step.kind {
        StepKind::Choice => {
            for option in &step.options {
                eprintln!("   • {} ({})", option.label, option.value);
            }
        }
        StepKind::DateTime => {
            render_calendars(session, companies);
        }
        StepKind::Summary => {
            for appointment in session.engine().selection().iter() {
                eprintln!(
                    "   {} on {} at {}",
                    appointment.company_id, appointment.date, appointment.time
                );
            }
            eprintln!("   Type 'submit' to finish.");
        }
        _ => {}
    }
}

fn render_calendars(session: &WizardSession, companies: &[Company]) {
    for company in companies {
        match session.calendar(&company.id) {
            Some(calendar) if calendar.error.is_some() => {
                eprintln!(
                    "   {} — ❌ {}",
                    company.name,
                    calendar.error.as_deref().unwrap_or_default()
                );
            }
            Some(calendar) => {
                eprintln!("   {}:", company.name);
                for (date, _day) in &calendar.days {
                    let status = session
                        .engine()
                        .day_status(&company.id, *date)
                        .map(|s| match s {
                            s if !s.is_disabled() => "open",
                            bookflow::scheduling::DayStatus::HeavilyBooked => "heavily booked",
                            _ => "fully booked",
                        })
                        .unwrap_or("unknown");
                    let marker = if calendar.selected_date == Some(*date) {
                        "★"
                    } else {
                        " "
                    };
                    eprintln!("     {marker} {date} — {status}");
                }
            }
            None => {
                eprintln!("   {} — type 'load' to fetch availability", company.name);
            }
        }
    }
}

fn demo_graph() -> Result<StepGraph, bookflow::error::GraphError> {
    StepGraph::new(vec![
        StepDefinition::choice(
            "category",
            "What kind of work do you need?",
            vec![
                ChoiceOption::new("Roof", "Roof repair or replacement"),
                ChoiceOption::new("Solar", "Solar panel installation"),
                ChoiceOption::new("Windows", "Window replacement"),
            ],
        ),
        StepDefinition::text("zip", "Where is the {category} project located? (ZIP)")
            .with_dependency(Dependency::KeyPresent {
                key: "category".into(),
            })
            .with_format(FieldFormat::PostalCode),
        StepDefinition::choice(
            "roof_material",
            "What is your roof made of?",
            vec![
                ChoiceOption::new("Asphalt", "Asphalt shingles"),
                ChoiceOption::new("Tile", "Tile"),
                ChoiceOption::new("Metal", "Metal"),
            ],
        )
        .with_dependency(Dependency::KeyEquals {
            key: "category".into(),
            value: "Roof".into(),
        }),
        StepDefinition::choice(
            "solar_bill",
            "What is your average monthly power bill?",
            vec![
                ChoiceOption::new("low", "Under $100"),
                ChoiceOption::new("mid", "$100–$200"),
                ChoiceOption::new("high", "Over $200"),
            ],
        )
        .with_dependency(Dependency::KeyEquals {
            key: "category".into(),
            value: "Solar".into(),
        }),
        StepDefinition::choice(
            "window_count",
            "How many windows need replacing?",
            vec![
                ChoiceOption::new("few", "1–3"),
                ChoiceOption::new("several", "4–9"),
                ChoiceOption::new("many", "10 or more"),
            ],
        )
        .with_dependency(Dependency::KeyEquals {
            key: "category".into(),
            value: "Windows".into(),
        }),
        StepDefinition::text("name", "Who should the installers ask for?").with_dependency(
            Dependency::KeyPresent {
                key: "zip".into(),
            },
        ),
        StepDefinition::datetime(
            "appointment",
            "Pick up to three companies for an on-site estimate",
        ),
        StepDefinition::summary("summary", "Review your request, {name}"),
    ])
}

fn demo_companies() -> Vec<Company> {
    vec![
        Company::new("acme", "Acme Exteriors"),
        Company::new("zenith", "Zenith Home Services"),
        Company::new("northstar", "Northstar Contracting"),
        Company::new("bluepeak", "Blue Peak Builders"),
    ]
}

/// Fixture availability: two weeks per company with varied load, including
/// fully-booked Sundays and one heavily booked day per company.
fn demo_availability(companies: &[Company]) -> InMemoryAvailability {
    let today = Utc::now().date_naive();
    let mut provider = InMemoryAvailability::new();

    for (offset, company) in companies.iter().enumerate() {
        let mut days = BTreeMap::new();
        for n in 0..14i64 {
            let date = today + ChronoDuration::days(n);
            let slots: Vec<Slot> = (9..15)
                .map(|hour| {
                    let available = if date.weekday().num_days_from_monday() == 6 {
                        false // Sundays fully booked
                    } else if n as usize % 7 == offset {
                        hour == 14 // one heavily booked day per company
                    } else {
                        hour % 2 == (offset % 2) as i32 || hour < 12
                    };
                    Slot::new(format!("{hour:02}:00"), available)
                })
                .collect();
            days.insert(
                date,
                AvailabilityDay::new(date.day(), date.weekday().to_string(), slots),
            );
        }
        provider = provider.with_company(company.id.clone(), days);
    }
    provider
}

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::SelectionRejected { message } => eprintln!("⚠️  {message}"),
            SessionEvent::AvailabilityFailed { company, message } => {
                eprintln!("⚠️  {company}: {message}")
            }
            SessionEvent::AvailabilityLoaded { company, days } => {
                tracing::debug!(company = %company, days, "availability loaded")
            }
            _ => {}
        }
    }
}
