//! # Engine
//!
//! Owns the world, the assembled program and the notifier, and steps jobs
//! on behalf of the scheduler.
//!
//! ```ignore
//! let mut engine = Engine::new(SimpleWorld::new(), &program)?;
//! let patches = engine.world().agents(AgentKind::Patch);
//! let mut job = engine.job("go", patches)?;
//! match engine.run(&mut job)? {
//!     StepOutcome::Finished => {}
//!     StepOutcome::Failed(err) => eprintln!("{}", err),
//!     StepOutcome::Continuing => unreachable!(),
//! }
//! ```

use crate::agent::AgentSet;
use crate::assembler::{Assembler, AssemblerOptions, Program};
use crate::context::Handle;
use crate::error::{self, Error, Result};
use crate::job::{self, HaltFlag, Job, Limits, StepOutcome};
use crate::notify::{NullNotifier, Notifier};
use crate::syntax::ProgramDef;
use crate::world::World;

/// The execution engine
pub struct Engine<W, N = NullNotifier> {
    world: W,
    program: Program,
    notifier: N,
    limits: Limits,
    halt: HaltFlag,
}

impl<W: World> Engine<W, NullNotifier> {
    /// Assemble `def` against `world`, rejecting unresolved identifiers
    pub fn new(world: W, def: &ProgramDef) -> Result<Self> {
        Self::with_options(world, def, AssemblerOptions::default())
    }

    pub fn with_options(world: W, def: &ProgramDef, options: AssemblerOptions) -> Result<Self> {
        let program = Assembler::with_options(options).assemble(def, &world)?;
        Ok(Self::from_program(world, program))
    }

    /// Wrap an already assembled program
    pub fn from_program(world: W, program: Program) -> Self {
        Engine {
            world,
            program,
            notifier: NullNotifier,
            limits: Limits::default(),
            halt: HaltFlag::new(),
        }
    }
}

impl<W: World, N: Notifier> Engine<W, N> {
    /// Replace the notifier
    pub fn with_notifier<M: Notifier>(self, notifier: M) -> Engine<W, M> {
        Engine {
            world: self.world,
            program: self.program,
            notifier,
            limits: self.limits,
            halt: self.halt,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// A flag that halts every running job when raised
    pub fn halt_flag(&self) -> HaltFlag {
        self.halt.clone()
    }

    /// Create a job running `procedure` for every agent of `agentset`, drawing
    /// from the world's main random stream
    pub fn job(&self, procedure: &str, agentset: AgentSet) -> Result<Job> {
        let (index, proc) = self.program.lookup(procedure)?;
        if proc.inputs > 0 {
            return Err(Error::invalid_argument(format!(
                "{} takes {} inputs and cannot be run as a job",
                proc.name, proc.inputs
            )));
        }
        Ok(Job::new(agentset, index, 0, self.world.main_random()))
    }

    /// Run one concurrent step of `job`.
    ///
    /// Recoverable errors abort the job and come back as
    /// [`StepOutcome::Failed`]; fatal ones are returned as `Err`.
    pub fn step(&mut self, job: &mut Job) -> Result<StepOutcome> {
        if job.is_finished() {
            return Ok(StepOutcome::Finished);
        }
        let mut handle = Handle {
            world: &mut self.world,
            program: &self.program,
            notifier: &mut self.notifier,
            limits: self.limits,
            halt: &self.halt,
            nesting: 0,
        };
        match job::step(&mut handle, job) {
            Ok(true) => Ok(StepOutcome::Finished),
            Ok(false) => Ok(StepOutcome::Continuing),
            Err(err) if err.is_fatal() => {
                tracing::error!(error = %err, "internal defect");
                Err(err)
            }
            Err(err) => {
                tracing::warn!(error = %err, "job failed");
                Ok(StepOutcome::Failed(err))
            }
        }
    }

    /// Step `job` until it finishes or fails, at most `max_steps` times
    pub fn run(&mut self, job: &mut Job) -> Result<StepOutcome> {
        for _ in 0..self.limits.max_steps {
            match self.step(job)? {
                StepOutcome::Continuing => continue,
                outcome => return Ok(outcome),
            }
        }
        job.abort();
        let err = error::step_limit_exceeded(self.limits.max_steps);
        tracing::warn!(error = %err, "job failed");
        Ok(StepOutcome::Failed(err))
    }

    /// Create and run a job in one go
    pub fn run_procedure(&mut self, procedure: &str, agentset: AgentSet) -> Result<StepOutcome> {
        let mut job = self.job(procedure, agentset)?;
        self.run(&mut job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, AgentRef};
    use crate::error::{ErrorKind, ExecutionSite};
    use crate::notify::RecordingNotifier;
    use crate::prim::{Command, Reporter};
    use crate::syntax::{Expr, ProcedureDef, Statement};
    use crate::value::Value;
    use crate::world::SimpleWorld;

    const PCOLOR: usize = 3;

    fn engine(procedures: Vec<ProcedureDef>) -> Engine<SimpleWorld, RecordingNotifier> {
        Engine::new(SimpleWorld::new(), &ProgramDef::new(procedures))
            .unwrap()
            .with_notifier(RecordingNotifier::new())
    }

    fn observer() -> AgentSet {
        AgentSet::from_agent(AgentRef::OBSERVER)
    }

    fn print(expr: Expr) -> Statement {
        Statement::new(Command::Print).arg(expr)
    }

    fn binary(reporter: Reporter, a: f64, b: f64) -> Expr {
        Expr::new(reporter).arg(Expr::constant(a)).arg(Expr::constant(b))
    }

    #[test]
    fn test_print_and_arithmetic() {
        let mut engine = engine(vec![ProcedureDef::new(
            "go",
            vec![print(binary(Reporter::Plus, 2.0, 3.0)), print(binary(Reporter::Lt, 1.0, 2.0))],
        )]);
        let outcome = engine.run_procedure("go", observer()).unwrap();
        assert!(outcome.is_finished());
        assert_eq!(engine.notifier().outputs, vec!["5", "true"]);
    }

    #[test]
    fn test_concurrent_step_switches_after_set() {
        let set = |v: f64| Statement::new(Command::SetPatchVariable { vn: PCOLOR }).arg(Expr::constant(v));
        let mut engine = engine(vec![ProcedureDef::new("go", vec![set(1.0), set(2.0)])]);
        let patches = engine.world().agents(AgentKind::Patch);
        let mut job = engine.job("go", patches).unwrap();

        assert!(matches!(engine.step(&mut job).unwrap(), StepOutcome::Continuing));
        for id in 0..9 {
            assert_eq!(engine.world().get_variable(AgentRef::patch(id), PCOLOR).unwrap(), Value::Number(1.0));
        }
        assert!(engine.step(&mut job).unwrap().is_finished());
        assert_eq!(engine.world().get_variable(AgentRef::patch(4), PCOLOR).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_repeat_and_locals() {
        // let total 0  repeat 4 [ set total total + 2 ]  print total
        let total = || Expr::new(Reporter::Local { slot: 0 });
        let body = vec![
            Statement::new(Command::Let { slot: 0 }).arg(Expr::constant(0.0)),
            Statement::new(Command::Repeat { slot: 1 })
                .arg(Expr::constant(4.0))
                .block(vec![Statement::new(Command::SetLocal { slot: 0 })
                    .arg(Expr::new(Reporter::Plus).arg(total()).arg(Expr::constant(2.0)))]),
            print(total()),
        ];
        let mut engine = engine(vec![ProcedureDef::new("go", body).with_locals(2)]);
        engine.run_procedure("go", observer()).unwrap();
        assert_eq!(engine.notifier().outputs, vec!["8"]);
    }

    #[test]
    fn test_while_and_ifelse() {
        // let i 0  while [i < 3] [ ifelse i = 1 [print "one"] [print i]  set i i + 1 ]
        let i = || Expr::new(Reporter::Local { slot: 0 });
        let body = vec![
            Statement::new(Command::Let { slot: 0 }).arg(Expr::constant(0.0)),
            Statement::new(Command::While)
                .arg(Expr::new(Reporter::Lt).arg(i()).arg(Expr::constant(3.0)))
                .block(vec![
                    Statement::new(Command::IfElse)
                        .arg(Expr::new(Reporter::Equal).arg(i()).arg(Expr::constant(1.0)))
                        .block(vec![print(Expr::constant("one"))])
                        .block(vec![print(i())]),
                    Statement::new(Command::SetLocal { slot: 0 })
                        .arg(Expr::new(Reporter::Plus).arg(i()).arg(Expr::constant(1.0))),
                ]),
        ];
        let mut engine = engine(vec![ProcedureDef::new("go", body).with_locals(1)]);
        engine.run_procedure("go", observer()).unwrap();
        assert_eq!(engine.notifier().outputs, vec!["0", "one", "2"]);
    }

    #[test]
    fn test_call_passes_inputs_and_stop_returns() {
        let body = vec![
            Statement::new(Command::Call { procedure: "show-twice".into(), index: 0 }).arg(Expr::constant(7.0)),
            print(Expr::constant("back")),
        ];
        let callee = vec![
            print(Expr::new(Reporter::Local { slot: 0 })),
            Statement::new(Command::Stop),
            print(Expr::constant("unreachable")),
        ];
        let mut engine = engine(vec![
            ProcedureDef::new("go", body),
            ProcedureDef::new("show-twice", callee).with_inputs(1),
        ]);
        engine.run_procedure("go", observer()).unwrap();
        assert_eq!(engine.notifier().outputs, vec!["7", "back"]);
    }

    #[test]
    fn test_recursion_hits_call_depth() {
        let body = vec![Statement::new(Command::Call { procedure: "go".into(), index: 0 })];
        let mut engine = engine(vec![ProcedureDef::new("go", body)]).with_limits(Limits {
            max_call_depth: 16,
            ..Limits::default()
        });
        match engine.run_procedure("go", observer()).unwrap() {
            StepOutcome::Failed(err) => assert_eq!(err.kind(), ErrorKind::CallDepthExceeded),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_runtime_error_is_bound_to_its_site() {
        let body = vec![print(binary(Reporter::Div, 1.0, 0.0).at(3, 9)).at(3, 3)];
        let mut engine = engine(vec![ProcedureDef::new("go", body)]);
        let err = match engine.run_procedure("go", observer()).unwrap() {
            StepOutcome::Failed(err) => err,
            other => panic!("unexpected outcome {:?}", other),
        };
        let site = ExecutionSite::from_error(&err).unwrap();
        assert_eq!(site.primitive, "/");
        assert_eq!(site.procedure, "go");
        assert_eq!(site.agent, "observer");
        assert_eq!(site.position.line, 3);
        assert_eq!(site.message, "Division by zero.");
    }

    #[test]
    fn test_domain_violation_becomes_runtime_error() {
        let body = vec![Statement::new(Command::SetPatchVariable { vn: PCOLOR })
            .arg(Expr::constant("red"))
            .at(2, 5)];
        let mut engine = engine(vec![ProcedureDef::new("go", body)]);
        let patch = AgentSet::from_agent(AgentRef::patch(0));
        let err = match engine.run_procedure("go", patch).unwrap() {
            StepOutcome::Failed(err) => err,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(err.message().starts_with("PCOLOR"));
        assert_eq!(err.context_value("primitive"), Some("set-patch-variable:pcolor"));
        assert!(engine.notifier().changes.is_empty());
    }

    #[test]
    fn test_carefully_catches_runtime_errors() {
        let body = vec![Statement::new(Command::Carefully)
            .block(vec![print(binary(Reporter::Div, 1.0, 0.0)), print(Expr::constant("skipped"))])
            .block(vec![print(Expr::new(Reporter::ErrorMessage))])];
        let mut engine = engine(vec![ProcedureDef::new("go", body)]);
        assert!(engine.run_procedure("go", observer()).unwrap().is_finished());
        assert_eq!(engine.notifier().outputs, vec!["Division by zero."]);
    }

    #[test]
    fn test_carefully_keeps_locals_written_before_error() {
        // let n 0  carefully [ set n 5  print 1 / 0 ] [ print n ]
        let n = || Expr::new(Reporter::Local { slot: 0 });
        let body = vec![
            Statement::new(Command::Let { slot: 0 }).arg(Expr::constant(0.0)),
            Statement::new(Command::Carefully)
                .block(vec![
                    Statement::new(Command::SetLocal { slot: 0 }).arg(Expr::constant(5.0)),
                    print(binary(Reporter::Div, 1.0, 0.0)),
                ])
                .block(vec![print(n())]),
        ];
        let mut engine = engine(vec![ProcedureDef::new("go", body).with_locals(1)]);
        assert!(engine.run_procedure("go", observer()).unwrap().is_finished());
        assert_eq!(engine.notifier().outputs, vec!["5"]);
    }

    #[test]
    fn test_unknown_identifier_is_fatal() {
        let body = vec![print(Expr::new(Reporter::UnknownIdentifier { name: "glorp".into() }))];
        let def = ProgramDef::new(vec![ProcedureDef::new("go", body.clone())]);
        let mut engine = Engine::with_options(
            SimpleWorld::new(),
            &def,
            AssemblerOptions { forgiving: true },
        )
        .unwrap();
        let err = engine.run_procedure("go", observer()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConsistency);

        // carefully does not swallow defects
        let wrapped = vec![Statement::new(Command::Carefully).block(body).block(vec![])];
        let def = ProgramDef::new(vec![ProcedureDef::new("go", wrapped)]);
        let mut engine =
            Engine::with_options(SimpleWorld::new(), &def, AssemblerOptions { forgiving: true }).unwrap();
        assert!(engine.run_procedure("go", observer()).unwrap_err().is_fatal());
    }

    #[test]
    fn test_halt_flag_stops_runaway_loop() {
        let body = vec![Statement::new(Command::While).arg(Expr::constant(true)).block(vec![])];
        let mut engine = engine(vec![ProcedureDef::new("go", body)]);
        engine.halt_flag().raise();
        match engine.run_procedure("go", observer()).unwrap() {
            StepOutcome::Failed(err) => assert_eq!(err.kind(), ErrorKind::Halted),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_step_limit() {
        // every patch switches forever
        let body = vec![Statement::new(Command::While).arg(Expr::constant(true)).block(vec![
            Statement::new(Command::SetPatchVariable { vn: PCOLOR }).arg(Expr::constant(1.0)),
        ])];
        let mut engine = engine(vec![ProcedureDef::new("go", body)]).with_limits(Limits {
            max_steps: 5,
            ..Limits::default()
        });
        let patches = engine.world().agents(AgentKind::Patch);
        match engine.run_procedure("go", patches).unwrap() {
            StepOutcome::Failed(err) => assert_eq!(err.kind(), ErrorKind::StepLimitExceeded),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_die_drops_agent_from_job() {
        let body = vec![Statement::new(Command::Die), print(Expr::constant("ghost"))];
        let world = SimpleWorld::from_spec(&crate::world::WorldSpec {
            turtles: 3,
            ..Default::default()
        })
        .unwrap();
        let def = ProgramDef::new(vec![ProcedureDef::new("go", body)]);
        let mut engine = Engine::new(world, &def).unwrap().with_notifier(RecordingNotifier::new());
        let turtles = engine.world().agents(AgentKind::Turtle);

        assert!(engine.run_procedure("go", turtles).unwrap().is_finished());
        assert!(engine.notifier().outputs.is_empty());
        assert!(engine.world().agents(AgentKind::Turtle).is_empty());
    }

    #[test]
    fn test_job_rejects_procedures_with_inputs() {
        let engine = engine(vec![ProcedureDef::new("f", vec![]).with_inputs(1)]);
        let err = engine.job("f", observer()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
