//! Draws inside a local randomness block do not disturb the main stream.
//!
//! Run with `cargo run -p drove-vm --example local_randomness`.

use drove_vm::{
    AgentRef, AgentSet, Command, Engine, Expr, ProcedureDef, ProgramDef, RecordingNotifier, Reporter, SimpleWorld,
    Statement, StepOutcome, WorldSpec,
};

fn random(n: f64) -> Expr {
    Expr::new(Reporter::Random).arg(Expr::constant(n))
}

fn print(expr: Expr) -> Statement {
    Statement::new(Command::Print).arg(expr)
}

fn main() -> drove_vm::Result<()> {
    // print random 100
    // with-local-randomness [ repeat 25 [ print random 100 ] ]
    // print random 100
    let go = ProcedureDef::new(
        "go",
        vec![
            print(random(100.0)),
            Statement::new(Command::WithLocalRandomness).block(vec![Statement::new(Command::Repeat { slot: 0 })
                .arg(Expr::constant(25.0))
                .block(vec![print(random(100.0))])]),
            print(random(100.0)),
        ],
    )
    .with_locals(1);

    let world = SimpleWorld::from_spec(&WorldSpec {
        seed: 42,
        ..WorldSpec::default()
    })?;
    let mut engine = Engine::new(world, &ProgramDef::new(vec![go]))?.with_notifier(RecordingNotifier::new());

    engine.program().pretty_print(engine.world());

    match engine.run_procedure("go", AgentSet::from_agent(AgentRef::OBSERVER))? {
        StepOutcome::Failed(err) => println!("failed: {}", err),
        _ => {
            let outputs = &engine.notifier().outputs;
            println!("before scope: {}", outputs[0]);
            println!("inside scope: {}", outputs[1..outputs.len() - 1].join(" "));
            println!("after scope:  {}", outputs[outputs.len() - 1]);
        }
    }
    Ok(())
}
