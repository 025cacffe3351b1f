//! manoctl: command-line client for SOL005 orchestration platforms.
//!
//! Every subcommand maps to one northbound operation; asynchronous operations
//! accept `--wait` to block until the orchestrator reaches a terminal state,
//! with `detailed-status` progress printed on stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use manoctl_client::{DeleteStatus, ManoClient, NsCreateParams};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "manoctl", version, about = "Client for SOL005 NFV orchestrators")]
struct Cli {
    /// Base URL of the orchestrator's northbound interface
    #[arg(long, env = "MANO_HOSTNAME", default_value = "https://localhost:9999/osm")]
    hostname: String,

    #[arg(long, env = "MANO_USER", default_value = "admin")]
    user: String,

    #[arg(long, env = "MANO_PASSWORD", default_value = "admin")]
    password: String,

    #[arg(long, env = "MANO_PROJECT", default_value = "admin")]
    project: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List network service instances
    NsList {
        /// Query string appended to the list request
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one network service instance
    NsShow {
        /// Name or id of the instance
        name: String,
        /// Print only this member of the record
        #[arg(long)]
        field: Option<String>,
    },
    /// Instantiate a network service
    NsCreate {
        /// Id of the NS descriptor to instantiate
        #[arg(long)]
        nsd_id: String,
        /// Name for the new instance
        #[arg(long)]
        ns_name: String,
        /// Id of the VIM account to deploy on
        #[arg(long)]
        vim_account: String,
        #[arg(long, default_value = "default description")]
        description: String,
        /// Comma-separated public key files injected into the instance
        #[arg(long)]
        ssh_keys: Option<String>,
        /// YAML instantiation config merged into the request
        #[arg(long)]
        config: Option<String>,
        /// Block until the instantiation finishes
        #[arg(long)]
        wait: bool,
    },
    /// Delete a network service instance
    NsDelete {
        name: String,
        #[arg(long)]
        force: bool,
        /// Block until the instance is gone
        #[arg(long)]
        wait: bool,
    },
    /// List the LCM operations of a network service
    NsOpList {
        name: String,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show the status of one LCM operation
    NsOpShow {
        operation_id: String,
    },
    /// Execute an action on a network service
    NsAction {
        ns_name: String,
        /// Name of the primitive/operation to run
        #[arg(long)]
        action: String,
        /// YAML or JSON parameters for the action
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        wait: bool,
    },
    /// Scale a VNF of a network service
    VnfScale {
        ns_name: String,
        #[arg(long)]
        vnf_name: String,
        #[arg(long)]
        scaling_group: String,
        /// Remove VDUs instead of adding them
        #[arg(long)]
        scale_in: bool,
        #[arg(long)]
        wait: bool,
    },
    /// List PDU descriptors
    PduList {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one PDU descriptor
    PduShow {
        name: String,
    },
    /// Register a PDU descriptor from a YAML file
    PduCreate {
        file: PathBuf,
    },
    /// Update a PDU descriptor from a YAML file
    PduUpdate {
        name: String,
        file: PathBuf,
    },
    /// Delete a PDU descriptor
    PduDelete {
        name: String,
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    log::debug!("connecting to {}", cli.hostname);
    let client = ManoClient::new(&cli.hostname)?;
    client
        .authenticate(&cli.user, &cli.password, &cli.project)
        .await
        .context("authentication failed")?;

    run(&client, cli.command).await
}

async fn run(client: &ManoClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::NsList { filter } => {
            let instances = client.ns().list(filter.as_deref()).await?;
            print_yaml(&Value::Array(instances))
        }
        Command::NsShow { name, field } => {
            let record = match field {
                Some(field) => client.ns().get_field(&name, &field).await?,
                None => client.ns().get_individual(&name).await?,
            };
            print_yaml(&record)
        }
        Command::NsCreate {
            nsd_id,
            ns_name,
            vim_account,
            description,
            ssh_keys,
            config,
            wait,
        } => {
            let params = NsCreateParams {
                nsd_id,
                ns_name,
                vim_account_id: vim_account,
                description,
                ssh_keys: load_ssh_keys(ssh_keys.as_deref())?,
                config,
            };
            let id = client.ns().create(&params, wait).await?;
            println!("{id}");
            Ok(())
        }
        Command::NsDelete { name, force, wait } => {
            let status = client.ns().delete(&name, force, wait).await?;
            print_delete_status(status);
            Ok(())
        }
        Command::NsOpList { name, filter } => {
            let operations = client.ns().list_op(&name, filter.as_deref()).await?;
            print_yaml(&Value::Array(operations))
        }
        Command::NsOpShow { operation_id } => {
            let operation = client.ns().get_op(&operation_id).await?;
            print_yaml(&operation)
        }
        Command::NsAction {
            ns_name,
            action,
            params,
            wait,
        } => {
            let op_data = params
                .as_deref()
                .map(parse_structured)
                .transpose()?;
            let op_id = client
                .ns()
                .exec_op(&ns_name, &action, op_data.as_ref(), wait)
                .await?;
            println!("{op_id}");
            Ok(())
        }
        Command::VnfScale {
            ns_name,
            vnf_name,
            scaling_group,
            scale_in,
            wait,
        } => {
            let op_id = client
                .ns()
                .scale_vnf(&ns_name, &vnf_name, &scaling_group, scale_in, wait)
                .await?;
            println!("{op_id}");
            Ok(())
        }
        Command::PduList { filter } => {
            let descriptors = client.pdu().list(filter.as_deref()).await?;
            print_yaml(&Value::Array(descriptors))
        }
        Command::PduShow { name } => {
            let descriptor = client.pdu().get_individual(&name).await?;
            print_yaml(&descriptor)
        }
        Command::PduCreate { file } => {
            let descriptor = read_descriptor(&file)?;
            let id = client.pdu().create(&descriptor).await?;
            println!("{id}");
            Ok(())
        }
        Command::PduUpdate { name, file } => {
            let descriptor = read_descriptor(&file)?;
            let id = client.pdu().update(&name, &descriptor).await?;
            println!("{id}");
            Ok(())
        }
        Command::PduDelete { name, force } => {
            let status = client.pdu().delete(&name, force).await?;
            print_delete_status(status);
            Ok(())
        }
    }
}

/// Read the comma-separated public key files of `--ssh-keys`.
fn load_ssh_keys(arg: Option<&str>) -> anyhow::Result<Vec<String>> {
    let Some(arg) = arg else {
        return Ok(Vec::new());
    };
    let mut keys = Vec::new();
    for path in arg.split(',') {
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read public key file '{path}'"))?;
        keys.push(key);
    }
    Ok(keys)
}

fn read_descriptor(file: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read descriptor file '{}'", file.display()))?;
    parse_structured(&text)
}

/// YAML is a superset of JSON, so one parser covers both input styles.
fn parse_structured(text: &str) -> anyhow::Result<Value> {
    serde_yaml::from_str(text).context("input is neither valid YAML nor JSON")
}

fn print_delete_status(status: DeleteStatus) {
    match status {
        DeleteStatus::InProgress => println!("Deletion in progress"),
        DeleteStatus::Deleted => println!("Deleted"),
    }
}

fn print_yaml(value: &Value) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}
