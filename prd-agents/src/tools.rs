//! Template tools available to agents.
//!
//! Each tool is a pure formatter: structured JSON in, Markdown out. No I/O,
//! no clock, so the same input always renders the same document. Agents that
//! carry a tool get its rendering as a reference skeleton for their step.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a tool could not render.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid input for {tool}: {message}")]
    Validation { tool: &'static str, message: String },
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

/// The closed set of generation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    PrdTemplate,
    TechStackAdvice,
    DevGuide,
}

/// (tool, config name, display name, description)
static TOOL_TABLE: [(Tool, &str, &str, &str); 3] = [
    (
        Tool::PrdTemplate,
        "prd_template",
        "PRD Template Generator",
        "Generates industry-standard PRD templates with structured sections",
    ),
    (
        Tool::TechStackAdvice,
        "tech_stack_advice",
        "Tech Stack Advisor",
        "Provides technology stack recommendations based on project requirements",
    ),
    (
        Tool::DevGuide,
        "dev_guide",
        "Development Guide Generator",
        "Creates detailed phase-by-phase development guides",
    ),
];

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::PrdTemplate, Tool::TechStackAdvice, Tool::DevGuide];

    fn row(self) -> &'static (Tool, &'static str, &'static str, &'static str) {
        TOOL_TABLE
            .iter()
            .find(|row| row.0 == self)
            .unwrap_or(&TOOL_TABLE[0])
    }

    /// Name used in pipeline configuration files.
    pub fn name(self) -> &'static str {
        self.row().1
    }

    pub fn display_name(self) -> &'static str {
        self.row().2
    }

    pub fn description(self) -> &'static str {
        self.row().3
    }

    /// Resolve a tool by config name or display name, ignoring case.
    pub fn from_name(name: &str) -> Result<Tool, ToolError> {
        let wanted = name.trim();
        TOOL_TABLE
            .iter()
            .find(|(_, key, display, _)| {
                key.eq_ignore_ascii_case(wanted) || display.eq_ignore_ascii_case(wanted)
            })
            .map(|row| row.0)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Render the tool's document from a JSON input object.
    pub fn generate(self, input: &Value) -> Result<String, ToolError> {
        match self {
            Tool::PrdTemplate => Ok(prd_template(&parse_input(self, input)?)),
            Tool::TechStackAdvice => Ok(tech_stack_advice(&parse_input(self, input)?)),
            Tool::DevGuide => Ok(dev_guide(&parse_input(self, input)?)),
        }
    }
}

fn parse_input<T: DeserializeOwned>(tool: Tool, input: &Value) -> Result<T, ToolError> {
    T::deserialize(input).map_err(|e| ToolError::Validation {
        tool: tool.name(),
        message: e.to_string(),
    })
}

// ── Inputs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdTemplateInput {
    pub project_name: String,
    pub requirements_data: Map<String, Value>,
    #[serde(default)]
    pub stakeholders: Vec<String>,
    /// Document date; `TBD` when absent.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechStackInput {
    pub project_type: String,
    pub requirements: Map<String, Value>,
    #[serde(default = "default_scale")]
    pub scale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevGuideInput {
    pub project_data: Map<String, Value>,
    #[serde(default = "default_methodology")]
    pub methodology: String,
}

fn default_scale() -> String {
    "medium".to_string()
}

fn default_methodology() -> String {
    "agile".to_string()
}

// ── Helpers ────────────────────────────────────────────────────────────

/// `"mobile app"` → `"Mobile App"`.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bullet_map(map: &Map<String, Value>) -> impl Iterator<Item = String> + '_ {
    map.iter()
        .map(|(key, value)| format!("- **{key}:** {}", render_value(value)))
}

// ── PRD template ───────────────────────────────────────────────────────

/// (section title, [(subsection title, placeholder)])
type Section = (&'static str, &'static [(&'static str, &'static str)]);

const PRD_SECTIONS: [Section; 14] = [
    ("Executive Summary", &[
        ("Product Vision", "[Product vision statement based on requirements]"),
        ("Business Objectives", "[Key business objectives and goals]"),
        ("Success Metrics", "[Measurable outcomes and KPIs]"),
    ]),
    ("Product Overview", &[
        ("Product Description", "[Comprehensive product description]"),
        ("Target Market", "[Market analysis and opportunity]"),
        ("User Personas", "[Detailed user persona definitions]"),
    ]),
    ("Stakeholder Analysis", &[
        ("Internal Stakeholders", "[Internal team members and their roles]"),
        ("External Stakeholders", "[External parties and their interests]"),
    ]),
    ("Functional Requirements", &[
        ("Core Features", "[Primary feature set with detailed descriptions]"),
        ("User Stories", "[User stories in \"As a [user], I want [feature] so that [benefit]\" format]"),
        ("Feature Prioritization", "[MoSCoW prioritization or similar framework]"),
    ]),
    ("Non-Functional Requirements", &[
        ("Performance Requirements", "[Response times, throughput, scalability requirements]"),
        ("Security Requirements", "[Authentication, authorization, data protection]"),
        ("Usability Requirements", "[User experience standards and accessibility]"),
        ("Compatibility Requirements", "[Browser, device, and platform compatibility]"),
    ]),
    ("Technical Requirements", &[
        ("System Architecture", "[High-level architecture overview]"),
        ("Integration Requirements", "[Third-party integrations and APIs]"),
        ("Data Requirements", "[Database schema and data flow requirements]"),
    ]),
    ("Design & User Experience", &[
        ("Design Principles", "[UI/UX design guidelines and principles]"),
        ("Wireframes & Mockups", "[References to design artifacts]"),
        ("User Journey Mapping", "[Key user flows and interactions]"),
    ]),
    ("Success Metrics & Analytics", &[
        ("Key Performance Indicators", "[Specific KPIs and measurement methods]"),
        ("Analytics Requirements", "[Tracking and reporting requirements]"),
    ]),
    ("Timeline & Milestones", &[
        ("Project Phases", "[High-level project timeline]"),
        ("Key Milestones", "[Critical project milestones and deadlines]"),
        ("Dependencies", "[External dependencies and blockers]"),
    ]),
    ("Resource Requirements", &[
        ("Team Structure", "[Required team members and roles]"),
        ("Budget Considerations", "[Cost estimates and budget requirements]"),
        ("Technology Resources", "[Hardware, software, and infrastructure needs]"),
    ]),
    ("Risk Management", &[
        ("Risk Assessment", "[Identified risks and impact assessment]"),
        ("Mitigation Strategies", "[Risk mitigation and contingency plans]"),
    ]),
    ("Quality Assurance", &[
        ("Testing Strategy", "[Testing approach and methodologies]"),
        ("Acceptance Criteria", "[Definition of done for each feature]"),
    ]),
    ("Launch Strategy", &[
        ("Go-to-Market Plan", "[Product launch and marketing strategy]"),
        ("Success Criteria", "[Launch success metrics and evaluation]"),
    ]),
    ("Post-Launch Support", &[
        ("Maintenance Plan", "[Ongoing maintenance and updates]"),
        ("Support Strategy", "[User support and issue resolution]"),
    ]),
];

const PRD_APPENDICES: [(&str, &str); 3] = [
    ("Glossary", "[Technical terms and definitions]"),
    ("References", "[Supporting documents and research]"),
    ("Change Log", "[Document revision history]"),
];

fn prd_template(input: &PrdTemplateInput) -> String {
    let date = input.date.as_deref().unwrap_or("TBD");
    let mut lines = vec![
        "# Product Requirements Document (PRD)".to_string(),
        format!("**Project:** {}", input.project_name),
        format!("**Date:** {date}"),
        "**Version:** 1.0".to_string(),
        String::new(),
        "## 1. Document Information".to_string(),
        "- **Document Owner:** Product Manager".to_string(),
        format!("- **Last Updated:** {date}"),
        "- **Review Cycle:** Weekly".to_string(),
        "- **Distribution:** Development Team, Stakeholders, QA Team".to_string(),
    ];

    for (i, (title, subsections)) in PRD_SECTIONS.iter().enumerate() {
        let number = i + 2;
        lines.push(String::new());
        lines.push(format!("## {number}. {title}"));
        for (j, (sub, placeholder)) in subsections.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("### {number}.{} {sub}", j + 1));
            match (number, j) {
                (4, 0) if !input.stakeholders.is_empty() => {
                    lines.extend(input.stakeholders.iter().map(|s| format!("- {s}")));
                }
                (5, 0) if !input.requirements_data.is_empty() => {
                    lines.push(placeholder.to_string());
                    lines.push(String::new());
                    lines.push("**Source requirements:**".to_string());
                    lines.extend(bullet_map(&input.requirements_data));
                }
                _ => lines.push(placeholder.to_string()),
            }
        }
    }

    lines.push(String::new());
    lines.push("## 16. Appendices".to_string());
    for (j, (sub, placeholder)) in PRD_APPENDICES.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("### 16.{} {sub}", j + 1));
        lines.push(placeholder.to_string());
    }

    lines.join("\n")
}

// ── Tech stack advice ──────────────────────────────────────────────────

/// Which recommendation table a project type resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Web,
    Mobile,
    Desktop,
}

impl ProjectType {
    /// Case-insensitive lookup; anything unrecognised gets the web table.
    pub fn resolve(name: &str) -> ProjectType {
        match name.trim().to_ascii_lowercase().as_str() {
            "mobile" => ProjectType::Mobile,
            "desktop" => ProjectType::Desktop,
            _ => ProjectType::Web,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ProjectType::Web => "Web",
            ProjectType::Mobile => "Mobile",
            ProjectType::Desktop => "Desktop",
        }
    }

    fn table(self) -> &'static [StackSection] {
        match self {
            ProjectType::Web => WEB_STACK,
            ProjectType::Mobile => MOBILE_STACK,
            ProjectType::Desktop => DESKTOP_STACK,
        }
    }
}

/// (heading, [(category, options)])
type StackSection = (&'static str, &'static [(&'static str, &'static [&'static str])]);

const WEB_STACK: &[StackSection] = &[
    ("Frontend Technologies", &[
        ("Primary", &["React.js + Next.js", "Vue.js + Nuxt.js", "Angular"]),
        ("Styling", &["Tailwind CSS", "Material-UI", "Ant Design"]),
        ("State Management", &["Redux Toolkit", "Zustand", "Pinia"]),
    ]),
    ("Backend Technologies", &[
        ("Primary", &["Node.js + Express", "Python + FastAPI", "Python + Django"]),
        ("Alternatives", &[".NET Core", "Ruby on Rails", "Go + Gin"]),
    ]),
    ("Database Solutions", &[
        ("Relational", &["PostgreSQL", "MySQL", "SQLite"]),
        ("NoSQL", &["MongoDB", "Redis", "Firebase Firestore"]),
    ]),
    ("DevOps & Deployment", &[
        ("Hosting", &["Vercel", "Netlify", "AWS", "DigitalOcean"]),
        ("Containers", &["Docker", "Kubernetes"]),
        ("CI/CD", &["GitHub Actions", "GitLab CI", "Jenkins"]),
    ]),
];

const MOBILE_STACK: &[StackSection] = &[
    ("Mobile Frameworks", &[
        ("Cross Platform", &["React Native", "Flutter", "Ionic"]),
        ("Native iOS", &["Swift", "Objective-C"]),
        ("Native Android", &["Kotlin", "Java"]),
    ]),
    ("Backend Technologies", &[
        ("Primary", &["Firebase", "Supabase", "Node.js", "Python"]),
    ]),
];

const DESKTOP_STACK: &[StackSection] = &[
    ("Desktop Frameworks", &[
        ("Cross Platform", &["Electron", "Tauri", "Flutter Desktop"]),
        ("Native", &["Python + Tkinter", "C# + WPF", "Java + JavaFX"]),
    ]),
];

const STACK_FOOTER: &str = "## Open Source Alternatives
- **Monitoring:** Prometheus + Grafana
- **Logging:** ELK Stack (Elasticsearch, Logstash, Kibana)
- **Version Control:** Git + GitHub/GitLab
- **Project Management:** OpenProject, Taiga
- **Communication:** Mattermost, Rocket.Chat

## Cost Analysis
- **Development Phase:** $0-500/month (using free tiers)
- **Production Phase:** $50-500/month (depending on scale)
- **Enterprise Scale:** $500-2000/month

## Implementation Timeline
1. **Week 1-2:** Development environment setup
2. **Week 3-4:** Core architecture implementation
3. **Week 5-8:** Feature development
4. **Week 9-10:** Testing and optimization
5. **Week 11-12:** Deployment and launch";

fn tech_stack_advice(input: &TechStackInput) -> String {
    let resolved = ProjectType::resolve(&input.project_type);
    let mut lines = vec![
        "# Technology Stack Recommendations".to_string(),
        String::new(),
        format!("## Project Type: {}", title_case(&input.project_type)),
        format!("## Scale: {}", title_case(&input.scale)),
        format!("## Recommendation Profile: {}", resolved.label()),
    ];

    if !input.requirements.is_empty() {
        lines.push(String::new());
        lines.push("## Key Requirements".to_string());
        lines.extend(bullet_map(&input.requirements));
    }

    lines.push(String::new());
    lines.push("## Recommended Architecture".to_string());
    for (heading, categories) in resolved.table() {
        lines.push(String::new());
        lines.push(format!("### {heading}"));
        for (category, options) in categories.iter() {
            lines.push(String::new());
            lines.push(format!("**{category}:**"));
            lines.extend(options.iter().map(|option| format!("- {option}")));
        }
    }

    lines.push(String::new());
    lines.push(STACK_FOOTER.to_string());
    lines.join("\n")
}

// ── Development guide ──────────────────────────────────────────────────

/// (phase title, weeks, [(block title, [items])])
type Phase = (&'static str, &'static str, &'static [(&'static str, &'static [&'static str])]);

const GUIDE_PHASES: [Phase; 7] = [
    ("Planning & Architecture", "Weeks 1-4", &[
        ("Week 1: Project Initialization", &[
            "Initialize the Git repository and branching strategy",
            "Configure IDEs, linters and formatters",
            "Agree team roles, communication channels and code review rules",
            "Sprint planning and Definition of Done",
        ]),
        ("Week 2: Technical Architecture Design", &[
            "High-level architecture diagrams",
            "Database schema (ERD) and migration plan",
            "API endpoints and data models",
            "Authentication and authorization design",
        ]),
        ("Week 3: Development Environment Setup", &[
            "Local environments and configuration files",
            "CI/CD pipeline with automated tests",
            "Deployment scripts for staging",
        ]),
        ("Week 4: UI/UX Design & Planning", &[
            "Wireframes and mockups",
            "Design system and component inventory",
            "Accessibility and responsiveness plan",
        ]),
    ]),
    ("Core Development Setup", "Weeks 5-6", &[
        ("Week 5: Foundation Development", &[
            "Project scaffolding and module layout",
            "Authentication service",
            "Database access layer",
            "Routing and navigation",
        ]),
        ("Week 6: Core Features Implementation", &[
            "User management",
            "Core business logic with validation and error handling",
            "Basic UI components wired to the API",
        ]),
    ]),
    ("MVP Feature Development", "Weeks 7-18", &[
        ("Sprint 1 (Weeks 7-8): User Management", &[
            "Registration, profile management, password reset",
        ]),
        ("Sprint 2 (Weeks 9-10): Core Features Set 1", &[
            "Primary features, search and filtering, dashboard",
        ]),
        ("Sprint 3 (Weeks 11-12): Core Features Set 2", &[
            "Advanced features, file management, notifications",
        ]),
        ("Sprint 4 (Weeks 13-14): Integrations", &[
            "Third-party APIs, payments where required",
        ]),
        ("Sprint 5 (Weeks 15-16): Advanced Features", &[
            "Analytics, admin panel, data export",
        ]),
        ("Sprint 6 (Weeks 17-18): Polish & Optimization", &[
            "Performance, UX refinements, accessibility fixes",
        ]),
    ]),
    ("Advanced Features & Integrations", "Weeks 19-24", &[
        ("Weeks 19-20: Performance Optimization", &[
            "Query tuning, caching, CDN for static assets",
        ]),
        ("Weeks 21-22: Security Hardening", &[
            "Security audit, encryption at rest, rate limiting",
        ]),
        ("Weeks 23-24: Scalability Preparation", &[
            "Load balancing, monitoring and alerting, disaster recovery",
        ]),
    ]),
    ("Testing & Quality Assurance", "Weeks 25-28", &[
        ("Week 25: Unit Testing", &["Critical-path coverage above 90%"]),
        ("Week 26: Integration Testing", &["API, database and third-party integration suites"]),
        ("Week 27: User Acceptance Testing", &["Stakeholder sessions and bug triage"]),
        ("Week 28: Performance & Security Testing", &["Load tests and vulnerability scans"]),
    ]),
    ("Deployment & Launch", "Weeks 29-30", &[
        ("Week 29: Production Deployment", &[
            "Production environment, migrations, TLS, DNS, backups",
        ]),
        ("Week 30: Launch & Monitoring", &[
            "DNS cutover, launch announcement, real-time monitoring",
        ]),
    ]),
    ("Post-Launch Support", "Ongoing", &[
        ("Week 31+: Maintenance & Iteration", &[
            "Daily health checks and feedback review",
            "Weekly patches and support tickets",
            "Monthly usage analysis and dependency updates",
            "Quarterly feature releases and security audits",
        ]),
    ]),
];

const GUIDE_FOOTER: &str = "## Quality Gates & Review Checkpoints
1. **Planning Gate:** architecture approved, team ready
2. **Development Gate:** code quality, coverage, feature completeness
3. **Testing Gate:** bug backlog resolved, performance benchmarks met
4. **Launch Gate:** production readiness confirmed

## Code Quality Standards
- **Code Coverage:** minimum 90% for critical paths
- **Performance:** page load under 3 seconds
- **Security:** OWASP compliance
- **Accessibility:** WCAG 2.1 AA

## Success Metrics & KPIs
- **Velocity:** story points per sprint
- **Bug Rate:** defects per feature and time to resolution
- **User Adoption:** monthly active users and retention
- **Reliability:** uptime and response times";

fn dev_guide(input: &DevGuideInput) -> String {
    let mut lines = vec![
        "# Comprehensive Development Guide".to_string(),
        String::new(),
        format!("## Methodology: {}", title_case(&input.methodology)),
    ];
    if let Some(Value::String(name)) = input.project_data.get("project_name") {
        lines.push(String::new());
        lines.push(format!(
            "Roadmap for **{name}**, from initial planning through post-launch support."
        ));
    }

    for (i, (title, weeks, blocks)) in GUIDE_PHASES.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("## Phase {}: {title} ({weeks})", i + 1));
        for (block, items) in blocks.iter() {
            lines.push(String::new());
            lines.push(format!("### {block}"));
            lines.extend(items.iter().map(|item| format!("- {item}")));
        }
    }

    lines.push(String::new());
    lines.push(GUIDE_FOOTER.to_string());
    lines.join("\n")
}
