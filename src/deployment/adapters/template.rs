//! `minijinja` source generator for Python and Node tool-servers.

use crate::deployment::domain::{
    GeneratedSource, LanguageVariant, PackagingFormat, ParameterSpec, ParameterType, ToolSpec,
};
use crate::deployment::ports::{GenerationRequest, GeneratorError, GeneratorResult, SourceGenerator};
use crate::process::DEFAULT_READINESS_MARKER;
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use serde_json::{Map, Value, json};

const PYTHON_STANDALONE: &str = include_str!("templates/python_standalone.py.j2");
const PYTHON_FASTMCP: &str = include_str!("templates/python_fastmcp.py.j2");
const NODE_STANDALONE: &str = include_str!("templates/node_standalone.mjs.j2");
const NODE_FASTMCP: &str = include_str!("templates/node_fastmcp.mjs.j2");

/// Renders tool-servers from built-in templates.
///
/// Generated servers print the readiness marker on stderr once their
/// stdio transport is up, which is what the startup probe waits for.
#[derive(Debug, Clone)]
pub struct TemplateSourceGenerator {
    readiness_marker: String,
}

impl TemplateSourceGenerator {
    /// Creates a generator whose servers announce `readiness_marker`.
    #[must_use]
    pub fn new(readiness_marker: impl Into<String>) -> Self {
        Self {
            readiness_marker: readiness_marker.into(),
        }
    }
}

impl Default for TemplateSourceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_READINESS_MARKER)
    }
}

impl SourceGenerator for TemplateSourceGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> GeneratorResult<GeneratedSource> {
        if request.descriptor.tools.is_empty() {
            return Err(GeneratorError::InvalidDescriptor(
                "at least one tool is required".to_owned(),
            ));
        }

        let tools = request
            .descriptor
            .tools
            .iter()
            .map(ToolContext::from_spec)
            .collect::<GeneratorResult<Vec<_>>>()?;
        let context = ServerContext {
            server_name: request.server_name.as_str().to_owned(),
            server_name_literal: literal(request.server_name.as_str())?,
            description: single_line(
                request
                    .descriptor
                    .description
                    .as_deref()
                    .unwrap_or("generated MCP tool-server"),
            ),
            marker_literal: literal(&self.readiness_marker)?,
            tools,
        };

        let (name, source) = template_for(request.format, request.language);
        let mut environment = Environment::new();
        environment.set_trim_blocks(true);
        environment.set_lstrip_blocks(true);
        environment.set_keep_trailing_newline(true);
        environment.set_auto_escape_callback(|_| AutoEscape::None);
        let rendered = environment
            .render_named_str(name, source, context)
            .map_err(GeneratorError::template)?;
        Ok(GeneratedSource::new(rendered))
    }
}

const fn template_for(
    format: PackagingFormat,
    language: LanguageVariant,
) -> (&'static str, &'static str) {
    match (format, language) {
        (PackagingFormat::Standalone, LanguageVariant::Python) => {
            ("python_standalone.py", PYTHON_STANDALONE)
        }
        (PackagingFormat::Fastmcp, LanguageVariant::Python) => ("python_fastmcp.py", PYTHON_FASTMCP),
        (PackagingFormat::Standalone, LanguageVariant::Node) => {
            ("node_standalone.mjs", NODE_STANDALONE)
        }
        (PackagingFormat::Fastmcp, LanguageVariant::Node) => ("node_fastmcp.mjs", NODE_FASTMCP),
    }
}

#[derive(Serialize)]
struct ServerContext {
    server_name: String,
    server_name_literal: String,
    description: String,
    marker_literal: String,
    tools: Vec<ToolContext>,
}

#[derive(Serialize)]
struct ToolContext {
    name_literal: String,
    description_literal: String,
    schema_json: String,
    schema_python_literal: String,
    python_signature: String,
    python_arguments: String,
    zod_shape: String,
}

impl ToolContext {
    fn from_spec(tool: &ToolSpec) -> GeneratorResult<Self> {
        let description = if tool.description.trim().is_empty() {
            format!("Tool {}", tool.name)
        } else {
            tool.description.clone()
        };
        let schema_json =
            serde_json::to_string(&input_schema(tool)).map_err(GeneratorError::template)?;

        let mut ordered: Vec<&ParameterSpec> = tool.parameters.iter().collect();
        ordered.sort_by_key(|parameter| !parameter.required);

        Ok(Self {
            name_literal: literal(&tool.name)?,
            description_literal: literal(&description)?,
            schema_python_literal: literal(&schema_json)?,
            schema_json,
            python_signature: python_signature(&ordered),
            python_arguments: python_arguments(&tool.parameters),
            zod_shape: zod_shape(&tool.parameters)?,
        })
    }
}

fn input_schema(tool: &ToolSpec) -> Value {
    let mut properties = Map::new();
    for parameter in &tool.parameters {
        let mut property = Map::new();
        property.insert(
            "type".to_owned(),
            Value::String(parameter.kind.json_type().to_owned()),
        );
        if let Some(description) = &parameter.description {
            property.insert("description".to_owned(), Value::String(description.clone()));
        }
        properties.insert(parameter.name.clone(), Value::Object(property));
    }
    let required: Vec<&str> = tool
        .parameters
        .iter()
        .filter(|parameter| parameter.required)
        .map(|parameter| parameter.name.as_str())
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

const fn python_type(kind: ParameterType) -> &'static str {
    match kind {
        ParameterType::String => "str",
        ParameterType::Number => "float",
        ParameterType::Integer => "int",
        ParameterType::Boolean => "bool",
    }
}

const fn zod_type(kind: ParameterType) -> &'static str {
    match kind {
        ParameterType::String => "z.string()",
        ParameterType::Number => "z.number()",
        ParameterType::Integer => "z.number().int()",
        ParameterType::Boolean => "z.boolean()",
    }
}

fn python_signature(ordered: &[&ParameterSpec]) -> String {
    ordered
        .iter()
        .map(|parameter| {
            let annotation = python_type(parameter.kind);
            if parameter.required {
                format!("{}: {annotation}", parameter.name)
            } else {
                format!("{}: {annotation} | None = None", parameter.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn python_arguments(parameters: &[ParameterSpec]) -> String {
    let entries = parameters
        .iter()
        .map(|parameter| format!("\"{0}\": {0}", parameter.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{entries}}}")
}

fn zod_shape(parameters: &[ParameterSpec]) -> GeneratorResult<String> {
    let mut entries = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let mut expression = zod_type(parameter.kind).to_owned();
        if let Some(description) = &parameter.description {
            expression.push_str(&format!(".describe({})", literal(description)?));
        }
        if !parameter.required {
            expression.push_str(".optional()");
        }
        entries.push(format!("{}: {expression}", parameter.name));
    }
    Ok(format!("{{ {} }}", entries.join(", ")))
}

/// Quotes `value` as a string literal valid in both Python and JavaScript.
fn literal(value: &str) -> GeneratorResult<String> {
    serde_json::to_string(value).map_err(GeneratorError::template)
}

fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|character| if character.is_control() { ' ' } else { character })
        .filter(|character| !matches!(character, '"' | '\\' | '`'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::domain::ServerName;
    use crate::deployment::domain::ResourceDescriptor;
    use rstest::{fixture, rstest};

    #[fixture]
    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor {
            name: "Weather API".to_owned(),
            description: Some("Forecasts \"fast\"\nand free".to_owned()),
            tools: vec![ToolSpec {
                name: "get_forecast".to_owned(),
                description: "Forecast for a city".to_owned(),
                parameters: vec![
                    ParameterSpec {
                        name: "days".to_owned(),
                        kind: ParameterType::Integer,
                        description: None,
                        required: false,
                    },
                    ParameterSpec {
                        name: "city".to_owned(),
                        kind: ParameterType::String,
                        description: Some("City name".to_owned()),
                        required: true,
                    },
                ],
            }],
            target_server: None,
        }
    }

    fn render(
        descriptor: &ResourceDescriptor,
        format: PackagingFormat,
        language: LanguageVariant,
    ) -> String {
        let server_name = ServerName::new("weather_api").expect("valid name");
        TemplateSourceGenerator::default()
            .generate(&GenerationRequest {
                descriptor,
                server_name: &server_name,
                format,
                language,
            })
            .expect("generation should succeed")
            .contents()
            .to_owned()
    }

    #[rstest]
    #[case::python_standalone(PackagingFormat::Standalone, LanguageVariant::Python, "from mcp.server import Server")]
    #[case::python_fastmcp(PackagingFormat::Fastmcp, LanguageVariant::Python, "from fastmcp import FastMCP")]
    #[case::node_standalone(PackagingFormat::Standalone, LanguageVariant::Node, "@modelcontextprotocol/sdk/server/index.js")]
    #[case::node_fastmcp(PackagingFormat::Fastmcp, LanguageVariant::Node, "import { FastMCP } from \"fastmcp\"")]
    fn every_variant_announces_readiness(
        descriptor: ResourceDescriptor,
        #[case] format: PackagingFormat,
        #[case] language: LanguageVariant,
        #[case] expected_import: &str,
    ) {
        let source = render(&descriptor, format, language);

        assert!(source.contains(expected_import), "{source}");
        assert!(source.contains("\"MCP server running\""), "{source}");
        assert!(source.contains("\"get_forecast\""), "{source}");
    }

    #[rstest]
    fn fastmcp_python_puts_required_parameters_first(descriptor: ResourceDescriptor) {
        let source = render(&descriptor, PackagingFormat::Fastmcp, LanguageVariant::Python);
        assert!(
            source.contains("def tool_1(city: str, days: int | None = None) -> str:"),
            "{source}"
        );
    }

    #[rstest]
    fn fastmcp_node_builds_zod_shape(descriptor: ResourceDescriptor) {
        let source = render(&descriptor, PackagingFormat::Fastmcp, LanguageVariant::Node);
        assert!(
            source.contains(
                "z.object({ days: z.number().int().optional(), city: z.string().describe(\"City name\") })"
            ),
            "{source}"
        );
    }

    #[rstest]
    fn description_cannot_break_out_of_docstring(descriptor: ResourceDescriptor) {
        let source = render(&descriptor, PackagingFormat::Standalone, LanguageVariant::Python);
        assert!(source.contains("\"\"\"weather_api: Forecasts fast and free\"\"\""), "{source}");
    }

    #[rstest]
    fn schema_lists_required_parameters(descriptor: ResourceDescriptor) {
        let tool = descriptor.tools.first().expect("one tool");
        assert_eq!(
            input_schema(tool)["required"],
            json!(["city"])
        );
    }

    #[rstest]
    fn empty_tool_list_is_rejected(mut descriptor: ResourceDescriptor) {
        descriptor.tools.clear();
        let server_name = ServerName::new("weather_api").expect("valid name");
        let result = TemplateSourceGenerator::default().generate(&GenerationRequest {
            descriptor: &descriptor,
            server_name: &server_name,
            format: PackagingFormat::Standalone,
            language: LanguageVariant::Python,
        });
        assert!(matches!(result, Err(GeneratorError::InvalidDescriptor(_))));
    }
}
