//! Services & Topics
//!
//! Service nodes become descriptor services whose methods carry
//! `google.api.http`; topics become publish-only services.

use crate::descriptor::ext::{
    http_rule, j5_service_options, HttpRule, J5MethodOptions, J5ServiceOptions,
    ListRequestQuery, StateEntityBinding, StateQueryMethod, TopicBinding,
};
use crate::descriptor::{
    MethodDescriptorProto, MethodOptions, ServiceOptions, HTTP_FILE, J5_EXT_FILE, J5_LIST_EXT_FILE,
};
use crate::error::SchemaError;
use crate::names::to_snake_case;
use crate::protobuild::builtin::EMPTY_FILE;
use crate::sourcedef::HttpMethod;
use crate::sourcewalk::{MethodNode, ServiceBinding, ServiceNode, TopicNode};

use super::builder::{FileBuilder, ServiceBuilder};
use super::Converter;

impl Converter<'_, '_> {
    /// Convert a service and attach it, with its request and response
    /// messages, to `file`.
    pub(super) fn service(&mut self, file: &mut FileBuilder, node: &ServiceNode) {
        let mut service = ServiceBuilder::new(&node.name, &node.source, node.description.as_deref());
        let binding = node.binding.as_ref().map(|binding| match binding {
            ServiceBinding::StateCommand { entity } => {
                j5_service_options::Type::StateCommand(StateEntityBinding {
                    entity: entity.clone(),
                })
            }
            ServiceBinding::StateQuery { entity } => {
                j5_service_options::Type::StateQuery(StateEntityBinding {
                    entity: entity.clone(),
                })
            }
        });
        if let Some(binding) = binding {
            self.use_file(J5_EXT_FILE);
            service.descriptor.options = Some(ServiceOptions {
                j5_service: Some(J5ServiceOptions {
                    r#type: Some(binding),
                }),
                ..Default::default()
            });
        }

        for method in &node.methods {
            let request = self.object(&method.request);
            let response = self.object(&method.response);
            let descriptor = self.method(method, request.name(), response.name());
            file.attach_message(request);
            file.attach_message(response);
            service.add_method(descriptor, &method.source, method.description.as_deref());
        }

        file.attach_service(service);
    }

    fn method(&mut self, node: &MethodNode, request: &str, response: &str) -> MethodDescriptorProto {
        let path = self.http_path(node);
        let pattern = match node.http_method {
            HttpMethod::Get => http_rule::Pattern::Get(path),
            HttpMethod::Post => http_rule::Pattern::Post(path),
            HttpMethod::Put => http_rule::Pattern::Put(path),
            HttpMethod::Patch => http_rule::Pattern::Patch(path),
            HttpMethod::Delete => http_rule::Pattern::Delete(path),
        };
        let body = match node.http_method {
            HttpMethod::Get => String::new(),
            _ => "*".to_string(),
        };
        self.use_file(HTTP_FILE);

        let j5_method = node.state_query.as_ref().map(|query| {
            self.use_file(J5_EXT_FILE);
            J5MethodOptions {
                state_query: Some(StateQueryMethod {
                    entity: query.entity.clone(),
                    part: query.part as i32,
                }),
            }
        });
        let list_request = node.list_query.as_ref().map(|query| ListRequestQuery {
            filterable_fields: query.filterable.clone(),
            sortable_fields: query.sortable.clone(),
            searchable_fields: query.searchable.clone(),
        });
        if list_request.is_some() {
            self.use_file(J5_LIST_EXT_FILE);
        }

        MethodDescriptorProto {
            name: Some(node.name.clone()),
            input_type: Some(format!(".{}.{}", self.package, request)),
            output_type: Some(format!(".{}.{}", self.package, response)),
            options: Some(MethodOptions {
                http: Some(HttpRule {
                    selector: String::new(),
                    pattern: Some(pattern),
                    body,
                }),
                j5_method,
                list_request,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// `/foo/:fooId` → `/foo/{foo_id}`. Every parameter must name a
    /// request property.
    fn http_path(&mut self, node: &MethodNode) -> String {
        let segments: Vec<String> = node
            .http_path
            .split('/')
            .map(|segment| {
                let Some(param) = segment.strip_prefix(':') else {
                    return segment.to_string();
                };
                let found = node.request.properties.iter().any(|p| p.name == param);
                if !found {
                    self.error(
                        &node.source,
                        SchemaError::PathParameterMissing {
                            method: node.name.clone(),
                            param: param.to_string(),
                        },
                    );
                }
                format!("{{{}}}", to_snake_case(param))
            })
            .collect();
        segments.join("/")
    }

    pub(super) fn topic(&mut self, file: &mut FileBuilder, node: &TopicNode) {
        let mut service = ServiceBuilder::new(
            format!("{}Topic", node.name),
            &node.source,
            node.description.as_deref(),
        );
        self.use_file(J5_EXT_FILE);
        self.use_file(EMPTY_FILE);
        service.descriptor.options = Some(ServiceOptions {
            j5_service: Some(J5ServiceOptions {
                r#type: Some(j5_service_options::Type::Topic(TopicBinding {
                    name: node.name.clone(),
                })),
            }),
            ..Default::default()
        });

        for message in &node.messages {
            let builder = self.object(message);
            let method_name = message
                .name
                .strip_suffix("Message")
                .unwrap_or(&message.name)
                .to_string();
            let method = MethodDescriptorProto {
                name: Some(method_name),
                input_type: Some(format!(".{}.{}", self.package, builder.name())),
                output_type: Some(".google.protobuf.Empty".to_string()),
                ..Default::default()
            };
            service.add_method(method, &message.source, message.description.as_deref());
            file.attach_message(builder);
        }

        file.attach_service(service);
    }
}
