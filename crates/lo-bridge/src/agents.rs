use serde::Serialize;

/// One automation entry point exposed for introspection.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub entry_command: &'static str,
}

/// Static catalog of the Lodge automation entry points. Fixed at process
/// start; no mutation API.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<AgentInfo>,
}

impl AgentRegistry {
    pub fn builtin() -> Self {
        Self {
            agents: vec![
                AgentInfo {
                    id: "verifier",
                    name: "Deploy Verifier",
                    description: "Runs the verification workflow against the live deployment",
                    entry_command: "/verify-latest",
                },
                AgentInfo {
                    id: "diagnostics",
                    name: "Diagnostics Runner",
                    description: "Collects service diagnostics through the diagnostics workflow",
                    entry_command: "/diagnose",
                },
                AgentInfo {
                    id: "client-deployer",
                    name: "Client Deployer",
                    description: "Builds and deploys the Lodge web client",
                    entry_command: "/deploy-client",
                },
                AgentInfo {
                    id: "digest",
                    name: "Status Digest",
                    description: "Aggregates workflow outcomes into daily and weekly digests",
                    entry_command: "/status-digest",
                },
                AgentInfo {
                    id: "config-steward",
                    name: "Config Steward",
                    description: "Updates client configuration variables behind admin gates",
                    entry_command: "/set-api-base",
                },
            ],
        }
    }

    pub fn list(&self) -> &[AgentInfo] {
        &self.agents
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }

    /// Render the catalog for the `agents` command.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .agents
            .iter()
            .map(|a| format!("• `{}` — **{}**: {} (`{}`)", a.id, a.name, a.description, a.entry_command))
            .collect();
        lines.push(format!("{} agents registered", self.count()));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_finite_and_restartable() {
        let reg = AgentRegistry::builtin();
        assert_eq!(reg.count(), reg.list().len());
        // Two enumerations observe the same catalog.
        let first: Vec<&str> = reg.list().iter().map(|a| a.id).collect();
        let second: Vec<&str> = reg.list().iter().map(|a| a.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn render_includes_every_agent_and_the_count() {
        let reg = AgentRegistry::builtin();
        let rendered = reg.render();
        for agent in reg.list() {
            assert!(rendered.contains(agent.id));
            assert!(rendered.contains(agent.entry_command));
        }
        assert!(rendered.contains(&format!("{} agents registered", reg.count())));
    }
}
