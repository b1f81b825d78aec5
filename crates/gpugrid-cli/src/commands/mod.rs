//! CLI commands implementation

use anyhow::Result;
use gpugrid_core::{ClusterStatus, NodeStatus, Task, TaskPriority, TaskRequest};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Manual scheduling response
#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    pub scheduled_tasks: usize,
    pub tasks: Vec<Task>,
}

/// Decode a successful response, or print the server's error and return None
async fn decode<T: DeserializeOwned>(response: reqwest::Response, action: &str) -> Result<Option<T>> {
    let status = response.status();
    debug!(%status, "Response received");
    if status.is_success() {
        Ok(Some(response.json().await?))
    } else {
        let error = response.text().await?;
        eprintln!("Failed to {}: {} {}", action, status, error);
        Ok(None)
    }
}

/// Submit a task
pub async fn submit(
    client: &ApiClient,
    id: Option<String>,
    duration: u32,
    memory: f64,
    priority: TaskPriority,
) -> Result<()> {
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut req = TaskRequest::new(id, duration, memory);
    req.priority = priority;

    let response = client
        .client
        .post(client.url("/tasks"))
        .json(&req)
        .send()
        .await?;

    if let Some(task) = decode::<Task>(response, "submit task").await? {
        println!("Task '{}' submitted", task.task_id);
        println!("  Duration: {}s", task.request.duration);
        println!("  Memory: {}GB", task.request.memory_required);
        println!("  Priority: {}", task.request.priority);
        println!("  Status: {}", task.status);
    }

    Ok(())
}

/// List active or finished tasks
pub async fn tasks(client: &ApiClient, finished: bool) -> Result<()> {
    let path = if finished { "/history" } else { "/tasks" };
    let response = client.client.get(client.url(path)).send().await?;

    if let Some(tasks) = decode::<Vec<Task>>(response, "list tasks").await? {
        if tasks.is_empty() {
            println!("No tasks found");
        } else {
            print_task_table(&tasks);
        }
    }

    Ok(())
}

/// Show a single task
pub async fn task(client: &ApiClient, id: &str) -> Result<()> {
    let response = client
        .client
        .get(client.url(&format!("/tasks/{}", id)))
        .send()
        .await?;

    if let Some(task) = decode::<Task>(response, "get task").await? {
        print_task_details(&task);
    }

    Ok(())
}

/// Cancel a pending task
pub async fn cancel(client: &ApiClient, id: &str) -> Result<()> {
    let response = client
        .client
        .delete(client.url(&format!("/tasks/{}", id)))
        .send()
        .await?;

    if let Some(task) = decode::<Task>(response, "cancel task").await? {
        println!("Task '{}' cancelled", task.task_id);
    }

    Ok(())
}

/// Show cluster status
pub async fn status(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .get(client.url("/cluster/status"))
        .send()
        .await?;

    if let Some(status) = decode::<ClusterStatus>(response, "get cluster status").await? {
        print_summary(&status);
    }

    Ok(())
}

/// List all nodes
pub async fn nodes(client: &ApiClient) -> Result<()> {
    let response = client.client.get(client.url("/nodes")).send().await?;

    if let Some(nodes) = decode::<Vec<NodeStatus>>(response, "list nodes").await? {
        print_node_table(&nodes);
    }

    Ok(())
}

/// Show a single node
pub async fn node(client: &ApiClient, id: u32) -> Result<()> {
    let response = client
        .client
        .get(client.url(&format!("/nodes/{}", id)))
        .send()
        .await?;

    if let Some(node) = decode::<NodeStatus>(response, "get node").await? {
        print_node_details(&node);
    }

    Ok(())
}

/// Take a node offline or bring it back
pub async fn set_offline(client: &ApiClient, id: u32, offline: bool) -> Result<()> {
    let action = if offline { "offline" } else { "online" };
    let response = client
        .client
        .post(client.url(&format!("/nodes/{}/{}", id, action)))
        .send()
        .await?;

    if let Some(node) = decode::<NodeStatus>(response, "change node state").await? {
        println!("Node {} is now {}", node.node_id, node.state);
    }

    Ok(())
}

/// Run a scheduling pass now
pub async fn schedule(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .post(client.url("/scheduler/run"))
        .send()
        .await?;

    if let Some(result) = decode::<ScheduleResponse>(response, "run scheduler").await? {
        println!("Scheduled {} task(s)", result.scheduled_tasks);
        for task in result.tasks {
            println!(
                "  {} -> node {}",
                task.task_id,
                task.assigned_node.map_or("-".to_string(), |n| n.to_string())
            );
        }
    }

    Ok(())
}

/// Show the cluster overview, optionally refreshing
pub async fn top(client: &ApiClient, watch: Option<u64>) -> Result<()> {
    loop {
        let response = client
            .client
            .get(client.url("/cluster/status"))
            .send()
            .await?;

        let Some(status) = decode::<ClusterStatus>(response, "get cluster status").await? else {
            return Ok(());
        };

        if watch.is_some() {
            // Clear screen and move the cursor home
            print!("\x1B[2J\x1B[H");
        }
        print_summary(&status);
        println!();
        print_node_table(&status.nodes);

        match watch {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs.max(1))).await,
            None => return Ok(()),
        }
    }
}

fn print_summary(status: &ClusterStatus) {
    println!("Simulated time: {:.1}s", status.timestamp);
    println!(
        "Nodes: {} total, {} available",
        status.total_nodes, status.available_nodes
    );
    println!(
        "Tasks: {} pending, {} running, {} completed, {} failed",
        status.pending_tasks, status.running_tasks, status.completed_tasks, status.failed_tasks
    );
}

fn print_task_table(tasks: &[Task]) {
    println!(
        "{:<38} {:<10} {:<9} {:<6} {:<8} {:<10} {:<10}",
        "ID", "STATUS", "PRIORITY", "NODE", "MEM(GB)", "START", "END"
    );
    println!("{}", "-".repeat(96));
    for task in tasks {
        println!(
            "{:<38} {:<10} {:<9} {:<6} {:<8} {:<10} {:<10}",
            task.task_id,
            task.status,
            task.request.priority,
            opt(task.assigned_node),
            task.request.memory_required,
            opt_time(task.start_time),
            opt_time(task.end_time)
        );
    }
}

fn print_task_details(task: &Task) {
    println!("Task: {}", task.task_id);
    println!("  Status: {}", task.status);
    println!("  Priority: {}", task.request.priority);
    println!("  Duration: {}s", task.request.duration);
    println!("  Memory: {}GB", task.request.memory_required);
    println!("  Node: {}", opt(task.assigned_node));
    println!("  Start: {}", opt_time(task.start_time));
    println!("  End: {}", opt_time(task.end_time));
    println!("  Submitted: {}", task.submitted_at.to_rfc3339());
}

fn print_node_table(nodes: &[NodeStatus]) {
    println!(
        "{:<5} {:<8} {:<10} {:>8} {:>9} {:>9} {:>6}  {:<20}",
        "ID", "TYPE", "STATE", "TEMP(C)", "POWER(W)", "MEM(GB)", "UTIL%", "TASK"
    );
    println!("{}", "-".repeat(84));
    for node in nodes {
        let t = &node.telemetry;
        println!(
            "{:<5} {:<8} {:<10} {:>8.1} {:>9.1} {:>9.1} {:>6.1}  {:<20}",
            node.node_id,
            node.gpu_type,
            node.state,
            t.temperature,
            t.power_usage,
            t.memory_usage,
            t.utilization,
            node.current_task
                .as_ref()
                .map_or("-", |task| task.task_id.as_str())
        );
    }
}

fn print_node_details(node: &NodeStatus) {
    let t = &node.telemetry;
    println!("Node {}", node.node_id);
    println!("  Type: {}", node.gpu_type);
    println!("  State: {}", node.state);
    println!("  Temperature: {:.2}C", t.temperature);
    println!("  Power: {:.2}W", t.power_usage);
    println!("  Memory: {:.2}GB", t.memory_usage);
    println!("  Utilization: {:.2}%", t.utilization);
    if let Some(task) = &node.current_task {
        println!(
            "  Task: {} ({}s, {}GB, started at {:.1}s)",
            task.task_id, task.duration, task.memory_required, task.started_at
        );
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or("-".to_string(), |v| v.to_string())
}

fn opt_time(value: Option<f64>) -> String {
    value.map_or("-".to_string(), |v| format!("{:.1}", v))
}
