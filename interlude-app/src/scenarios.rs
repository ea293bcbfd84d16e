//! Demo agent trees. Each runs on a deterministic scripted model unless a live
//! OpenAI-compatible endpoint is configured through the environment.

use async_trait::async_trait;
use interlude_core::{Agent, AgentError, AgentInput, AgentOutcome, EventKind, Message, RunContext, ToolCall};
use interlude_providers::{last_tool_result, last_user_text, ChatModel, OpenAICompatibleModel, ScriptedModel};
use interlude_runtime::{
    ChatModelAgent, ChatModelAgentConfig, HumanReviewAgent, LoopAgent, RuntimeConfig, SequentialAgent,
    SupervisorAgent, TRANSFER_TOOL,
};
use interlude_tools::{
    ApprovalWrapper, FollowUpTool, FunctionTool, ReviewEditWrapper, Tool, ToolError, ToolRegistry,
};
use serde_json::json;
use std::sync::Arc;

pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    pub query: &'static str,
    build: fn(&RuntimeConfig) -> Arc<dyn Agent>,
}

impl Scenario {
    pub fn agent(&self, config: &RuntimeConfig) -> Arc<dyn Agent> {
        (self.build)(config)
    }
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "booking",
        summary: "ticket booking gated by an approval prompt",
        query: "book a ticket for Martin, to Beijing, on 2025-12-01, the phone number is 1234567. directly call tool.",
        build: booking,
    },
    Scenario {
        name: "review",
        summary: "ticket booking whose arguments can be edited before running",
        query: "book a ticket for Martin, to Beijing, on 2025-12-01, the phone number is 1234567. directly call tool.",
        build: review_edit,
    },
    Scenario {
        name: "feedback",
        summary: "writer/reviewer loop that revises until the reviewer accepts",
        query: "write a short poem about the sea",
        build: feedback_loop,
    },
    Scenario {
        name: "follow-up",
        summary: "trip planner that asks clarifying questions",
        query: "plan a trip for me",
        build: follow_up,
    },
    Scenario {
        name: "plan",
        summary: "plan, then execute reviewed flight and hotel bookings step by step",
        query: "plan a 4 day trip from Beijing to Paris starting 2025-12-01, book the flight and the hotel",
        build: plan_execute_replan,
    },
    Scenario {
        name: "supervisor",
        summary: "financial supervisor delegating an approval-gated transfer",
        query: "transfer 100 from checking to savings",
        build: supervisor,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Live model when `INTERLUDE_LLM_ENDPOINT` and `INTERLUDE_LLM_MODEL` are set,
/// else the scripted stand-in.
fn model(scripted: ScriptedModel) -> Arc<dyn ChatModel> {
    match (
        std::env::var("INTERLUDE_LLM_ENDPOINT"),
        std::env::var("INTERLUDE_LLM_MODEL"),
    ) {
        (Ok(endpoint), Ok(model)) => Arc::new(OpenAICompatibleModel::new(
            endpoint,
            std::env::var("INTERLUDE_LLM_API_KEY").ok(),
            model,
        )),
        _ => Arc::new(scripted),
    }
}

fn book_ticket() -> Arc<dyn Tool> {
    Arc::new(
        FunctionTool::new("BookTicket", "this tool can book ticket of the specific location", |args| {
            let field = |key: &str| {
                args[key]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::Validation(format!("missing '{}'", key)))
            };
            Ok(format!(
                "success! ticket booked to {} for {} ({})",
                field("location")?,
                field("passenger_name")?,
                field("passenger_phone_number")?
            ))
        })
        .with_schema(json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "location of the ticket" },
                "passenger_name": { "type": "string", "description": "name of the passenger" },
                "passenger_phone_number": { "type": "string", "description": "phone number of the passenger" }
            },
            "required": ["location", "passenger_name", "passenger_phone_number"]
        })),
    )
}

fn booking_model() -> ScriptedModel {
    ScriptedModel::new("booking-model", |messages, _| match last_tool_result(messages, "BookTicket") {
        Some(result) => Ok(Message::assistant(format!("Booking result: {}", result))),
        None => Ok(Message::assistant_with_tools(
            "",
            vec![ToolCall::new(
                "call_1",
                "BookTicket",
                r#"{"location":"Beijing","passenger_name":"Martin","passenger_phone_number":"1234567"}"#,
            )],
        )),
    })
}

fn ticket_booker(config: &RuntimeConfig, tool: Arc<dyn Tool>) -> Arc<dyn Agent> {
    Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("TicketBooker", "An agent that can book tickets", model(booking_model()))
            .with_instruction("You are an expert ticket booker. Based on the user's request, use the BookTicket tool.")
            .with_tools(ToolRegistry::new().with(tool))
            .with_max_iterations(config.max_iterations),
    ))
}

fn booking(config: &RuntimeConfig) -> Arc<dyn Agent> {
    ticket_booker(config, Arc::new(ApprovalWrapper::new(book_ticket())))
}

fn review_edit(config: &RuntimeConfig) -> Arc<dyn Agent> {
    ticket_booker(config, Arc::new(ReviewEditWrapper::new(book_ticket())))
}

fn feedback_loop(config: &RuntimeConfig) -> Arc<dyn Agent> {
    let writer_model = ScriptedModel::new("writer-model", |messages, _| {
        let feedback: Vec<&Message> = messages
            .iter()
            .filter(|m| m.name.as_deref() == Some("ReviewAgent"))
            .collect();
        match feedback.last() {
            None => Ok(Message::assistant(
                "The tide rolls in with silver light,\nand gulls keep watch through the night.",
            )),
            Some(last) => Ok(Message::assistant(format!(
                "Revision {} (taking into account: {}):\nThe tide rolls in, the tide rolls out,\nthe sea knows what the wind's about.",
                feedback.len(),
                last.content
            ))),
        }
    });
    let writer: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("WriterAgent", "Writes and revises content", model(writer_model))
            .with_instruction("You are a poet. Write the requested content, revising it according to any feedback.")
            .with_output_key("content_to_review")
            .with_max_iterations(config.max_iterations),
    ));
    let reviewer: Arc<dyn Agent> = Arc::new(HumanReviewAgent::new(
        "ReviewAgent",
        "Asks a human to review the draft",
        "content_to_review",
    ));
    Arc::new(LoopAgent::new(
        "WriterReviewLoop",
        "Writes until the reviewer is satisfied",
        vec![writer, reviewer],
        config.max_loop_iterations,
    ))
}

fn follow_up(config: &RuntimeConfig) -> Arc<dyn Agent> {
    let planner_model = ScriptedModel::new("planner-model", |messages, _| {
        match last_tool_result(messages, "FollowUpTool") {
            None => Ok(Message::assistant_with_tools(
                "",
                vec![ToolCall::new(
                    "ask_1",
                    "FollowUpTool",
                    r#"{"questions":["Where would you like to go?","What is your budget?","How many days do you have?"]}"#,
                )],
            )),
            Some(answers) => Ok(Message::assistant(format!(
                "Here is your plan, based on what you told me:\n{}",
                answers
            ))),
        }
    });
    Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("TripPlanner", "Plans trips", model(planner_model))
            .with_instruction("You plan trips. Ask the user follow-up questions when information is missing.")
            .with_tools(ToolRegistry::new().with(Arc::new(FollowUpTool::new())))
            .with_max_iterations(config.max_iterations),
    ))
}

const PLAN_KEY: &str = "plan";
const EXECUTED_STEPS_KEY: &str = "executed_steps";

/// Checks progress against the plan kept in the session. Names the next
/// step, or exits the loop once every step has a result.
struct Replanner;

#[async_trait]
impl Agent for Replanner {
    fn name(&self) -> &str {
        "Replanner"
    }

    fn description(&self) -> &str {
        "Decides whether the plan is finished"
    }

    async fn run(&self, ctx: &RunContext, input: &AgentInput) -> Result<AgentOutcome, AgentError> {
        let plan: String = ctx
            .get_typed_context_params(PLAN_KEY)
            .ok_or_else(|| AgentError::Protocol("replanner found no plan in the session".into()))?;
        let mut executed: Vec<String> = ctx.get_typed_context_params(EXECUTED_STEPS_KEY).unwrap_or_default();
        if let Some(last) = input.messages.last() {
            executed.push(last.content.clone());
        }
        ctx.append_context_params([(EXECUTED_STEPS_KEY, &executed)])?;

        let next = plan.lines().nth(executed.len());
        let text = match next {
            Some(step) => format!("next step: {}", step),
            None => format!("all {} step(s) of the plan are done:\n{}", executed.len(), plan),
        };
        let message = Message::assistant(text).named(self.name());
        ctx.emit(EventKind::Output {
            message: message.clone(),
        })
        .await;

        match next {
            Some(_) => Ok(AgentOutcome::message(message)),
            None => Ok(AgentOutcome::exit()),
        }
    }
}

fn booking_tool(name: &'static str, description: &str, schema: serde_json::Value) -> Arc<dyn Tool> {
    let inner: Arc<dyn Tool> = Arc::new(
        FunctionTool::new(name, description, move |args| {
            Ok(json!({ "status": "confirmed", "booking": name, "details": args }).to_string())
        })
        .with_schema(schema),
    );
    Arc::new(ReviewEditWrapper::new(inner))
}

fn plan_execute_replan(config: &RuntimeConfig) -> Arc<dyn Agent> {
    let planner: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new(
            "Planner",
            "Breaks the request into steps",
            model(ScriptedModel::constant(
                "planner-model",
                "book_flight from Beijing to Paris on 2025-12-01\nbook_hotel in Paris from 2025-12-01 to 2025-12-05",
            )),
        )
        .with_instruction("Write a plan with one step per line. Each line starts with the tool that executes it.")
        .with_output_key(PLAN_KEY),
    ));

    // Runs the step the replanner named last, or the first line of the plan.
    let executor_model = ScriptedModel::new("executor-model", |messages, _| {
        let step = messages
            .iter()
            .rev()
            .find(|m| m.name.as_deref() == Some("Replanner"))
            .map(|m| m.content.trim_start_matches("next step: ").to_string())
            .or_else(|| {
                messages
                    .iter()
                    .find(|m| m.name.as_deref() == Some("Planner"))
                    .and_then(|m| m.content.lines().next().map(str::to_string))
            })
            .unwrap_or_default();
        let (tool, id, args) = if step.starts_with("book_flight") {
            (
                "book_flight",
                "call_flight",
                r#"{"from":"Beijing","to":"Paris","date":"2025-12-01","passengers":1,"preferred_time":"morning"}"#,
            )
        } else {
            (
                "book_hotel",
                "call_hotel",
                r#"{"city":"Paris","check_in":"2025-12-01","check_out":"2025-12-05","guests":1,"room_type":"standard"}"#,
            )
        };
        match last_tool_result(messages, tool) {
            Some(result) => Ok(Message::assistant(format!("{} done: {}", tool, result))),
            None => Ok(Message::assistant_with_tools("", vec![ToolCall::new(id, tool, args)])),
        }
    });
    let tools = ToolRegistry::new()
        .with(booking_tool(
            "book_flight",
            "Book a flight; the user reviews the booking first",
            json!({
                "type": "object",
                "properties": {
                    "from": { "type": "string", "description": "Departure city" },
                    "to": { "type": "string", "description": "Destination city" },
                    "date": { "type": "string", "description": "Departure date in YYYY-MM-DD format" },
                    "passengers": { "type": "integer", "description": "Number of passengers" },
                    "preferred_time": { "type": "string", "description": "morning, afternoon or evening" }
                },
                "required": ["from", "to", "date"]
            }),
        ))
        .with(booking_tool(
            "book_hotel",
            "Book a hotel; the user reviews the booking first",
            json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City to book the hotel in" },
                    "check_in": { "type": "string", "description": "Check-in date in YYYY-MM-DD format" },
                    "check_out": { "type": "string", "description": "Check-out date in YYYY-MM-DD format" },
                    "guests": { "type": "integer", "description": "Number of guests" },
                    "room_type": { "type": "string", "description": "standard, deluxe or suite" }
                },
                "required": ["city", "check_in", "check_out"]
            }),
        ));
    let executor: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("Executor", "Executes one plan step", model(executor_model))
            .with_instruction("You are a diligent travel booking assistant. Execute the current plan step with the available tools.")
            .with_tools(tools)
            .with_max_iterations(config.max_iterations),
    ));

    let execute_replan: Arc<dyn Agent> = Arc::new(LoopAgent::new(
        "execute_replan",
        "Executes plan steps until the replanner is satisfied",
        vec![executor, Arc::new(Replanner)],
        config.max_loop_iterations,
    ));
    Arc::new(SequentialAgent::new(
        "plan_execute_replan",
        "Plans a trip and books it step by step",
        vec![planner, execute_replan],
    ))
}

fn supervisor(config: &RuntimeConfig) -> Arc<dyn Agent> {
    let transfer_funds: Arc<dyn Tool> = Arc::new(
        FunctionTool::new("transfer_funds", "Move money between accounts", |args| {
            Ok(format!(
                "transferred {} from {} to {}",
                args["amount"],
                args["from"].as_str().unwrap_or("checking"),
                args["to"].as_str().unwrap_or("savings")
            ))
        })
        .with_schema(json!({
            "type": "object",
            "properties": {
                "from": { "type": "string" },
                "to": { "type": "string" },
                "amount": { "type": "number" }
            },
            "required": ["from", "to", "amount"]
        })),
    );

    let transfer_model = ScriptedModel::new("transfer-model", |messages, _| {
        match last_tool_result(messages, "transfer_funds") {
            Some(result) => Ok(Message::assistant(format!("Transfer finished: {}", result))),
            None => Ok(Message::assistant_with_tools(
                "",
                vec![ToolCall::new(
                    "call_transfer",
                    "transfer_funds",
                    r#"{"from":"checking","to":"savings","amount":100}"#,
                )],
            )),
        }
    });
    let transfer_agent: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(
        ChatModelAgentConfig::new("TransferAgent", "Executes transfers", model(transfer_model))
            .with_tools(ToolRegistry::new().with(Arc::new(ApprovalWrapper::new(transfer_funds))))
            .with_max_iterations(config.max_iterations),
    ));

    let precheck: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(ChatModelAgentConfig::new(
        "PrecheckAgent",
        "Checks that the transfer is allowed",
        model(ScriptedModel::constant(
            "precheck-model",
            "precheck passed: accounts exist and balance is sufficient",
        )),
    )));
    let retry_loop: Arc<dyn Agent> = Arc::new(LoopAgent::new("transfer_loop", "", vec![transfer_agent], 1));
    let pipeline: Arc<dyn Agent> = Arc::new(SequentialAgent::new(
        "transaction_pipeline",
        "Handles money transfers between accounts",
        vec![precheck, retry_loop],
    ));
    let account_info: Arc<dyn Agent> = Arc::new(ChatModelAgent::new(ChatModelAgentConfig::new(
        "account_info",
        "Answers questions about account balances",
        model(ScriptedModel::constant(
            "account-model",
            "checking: 1200, savings: 5400",
        )),
    )));

    let controller = ScriptedModel::new("supervisor-model", |messages, _| {
        let answered = messages
            .iter()
            .rev()
            .find(|m| matches!(m.name.as_deref(), Some("transaction_pipeline") | Some("account_info")));
        if let Some(answer) = answered {
            return Ok(Message::assistant(format!("Done. {}", answer.content)));
        }
        let dest = match last_user_text(messages) {
            Some(text) if text.contains("balance") => "account_info",
            _ => "transaction_pipeline",
        };
        Ok(Message::assistant_with_tools(
            "",
            vec![ToolCall::new(
                "route_1",
                TRANSFER_TOOL,
                json!({ "agent_name": dest }).to_string(),
            )],
        ))
    });
    Arc::new(
        SupervisorAgent::new(
            "financial_supervisor",
            "Routes banking requests",
            model(controller),
            vec![pipeline, account_info],
        )
        .with_instruction("You supervise banking agents. Delegate each request to the right agent.")
        .with_max_turns(config.max_supervisor_turns),
    )
}
