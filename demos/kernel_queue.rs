use std::time::Duration;
use turnstile::{BoxError, ExecutionContext, SchedulerBuilder, SubmitOptions};

/// Pretend to evaluate a cell of code
async fn evaluate(code: String) -> Result<String, BoxError> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let culture = ExecutionContext::current()
        .get("culture")
        .unwrap_or("invariant")
        .to_string();
    println!("[KERNEL] Evaluated `{}` (culture: {})", code, culture);
    Ok(format!("{code} => ok"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🚀 Starting a notebook-style kernel queue...\n");

    let scheduler = SchedulerBuilder::<String, String>::new()
        .preempt_when(|_current, incoming| incoming.starts_with("#!"))
        .build();

    // Python cells need the python kernel started first.
    scheduler.register_deferred_operation_source(
        |pending: &String, scope: &str| {
            if scope == "python" {
                vec![format!("#!start-python (for `{pending}`)")]
            } else {
                Vec::new()
            }
        },
        |directive: String| async move {
            println!("[DEFERRED] {}", directive);
            Ok::<_, BoxError>(directive)
        },
    )?;

    let context = ExecutionContext::new().with_property("culture", "fr-FR");
    let mut cells = Vec::new();
    for (code, scope) in [("let x = 1", "csharp"), ("print(x)", "python"), ("x + 1", "csharp")] {
        let completion = ExecutionContext::scope(
            context.clone(),
            scheduler.submit_with(code.to_string(), evaluate, SubmitOptions::new().scope(scope)),
        )
        .await?;
        cells.push((code, completion));
    }
    println!("✅ Queued {} cells\n", cells.len());

    // Directives jump ahead of queued cells.
    let directive = scheduler
        .submit("#!who".to_string(), |directive: String| async move {
            println!("[DIRECTIVE] {} ran ahead of the queue", directive);
            Ok::<_, BoxError>(directive)
        })
        .await?;
    println!("📊 Directive finished: {:?}\n", directive.await?);

    for (code, completion) in cells {
        match completion.await {
            Ok(result) => println!("📊 {}", result),
            Err(e) => println!("❌ `{}` failed: {}", code, e),
        }
    }

    scheduler.shutdown().await;
    println!("\n✅ Kernel queue shut down");
    Ok(())
}
