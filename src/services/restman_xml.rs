//! restman 响应（gateway-management 命名空间的 XML）解码
//!
//! 元素一律按本地名匹配，忽略命名空间前缀。

use quick_xml::{Reader, events::Event};
use std::fmt::Display;

use crate::{
    error::FetchError,
    models::{DependencyKind, FolderChildren, FolderRef, ResolutionPath, ServiceRef},
};

fn xml_error<E: Display>(e: E) -> FetchError {
    FetchError::format(format!("XML解析失败: {}", e))
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// 依赖记录 / 文件夹条目的文本字段
#[derive(Debug, Default)]
struct RecordFields {
    kind: String,
    name: String,
    id: String,
}

impl RecordFields {
    fn append(&mut self, field: &str, text: &str) {
        match field {
            "Type" => self.kind.push_str(text),
            "Name" => self.name.push_str(text),
            "Id" => self.id.push_str(text),
            _ => {}
        }
    }
}

/// 解析 `GET /restman/1.0/folders`：根元素下每个 `Item` 的 `Name` 与 `Id`
pub fn parse_folder_list(xml: &str) -> Result<Vec<FolderRef>, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut current: Option<RecordFields> = None;
    let mut folders = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                saw_root = true;
                let name = local_name(e.local_name().as_ref());
                if stack.len() == 1 && name == "Item" {
                    current = Some(RecordFields::default());
                }
                stack.push(name);
            }
            Event::Empty(_) => saw_root = true,
            Event::Text(t) => {
                if let (Some(item), 3) = (current.as_mut(), stack.len()) {
                    let text = t.unescape().map_err(xml_error)?;
                    item.append(&stack[2], &text);
                }
            }
            Event::End(_) => {
                if stack.len() == 2 && stack[1] == "Item" {
                    if let Some(item) = current.take() {
                        let (id, name) = (item.id.trim(), item.name.trim());
                        if !id.is_empty() {
                            folders.push(FolderRef::new(id, name));
                        }
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FetchError::format("文件夹列表响应为空"));
    }
    Ok(folders)
}

/// 解析 `GET /restman/1.0/folders/{id}/dependencies`
///
/// 文档中任意层级的 `Dependency` 都按其 `Type` 子元素分类，顺序与文档一致；
/// 既不是 SERVICE 也不是 FOLDER 的记录被忽略。
pub fn parse_dependencies(xml: &str) -> Result<FolderChildren, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    // (Dependency 元素所在深度, 出现顺序, 字段)
    let mut open: Vec<(usize, usize, RecordFields)> = Vec::new();
    let mut finished: Vec<(usize, RecordFields)> = Vec::new();
    let mut seq = 0usize;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                saw_root = true;
                let name = local_name(e.local_name().as_ref());
                let is_dependency = name == "Dependency";
                stack.push(name);
                if is_dependency {
                    open.push((stack.len(), seq, RecordFields::default()));
                    seq += 1;
                }
            }
            Event::Empty(_) => saw_root = true,
            Event::Text(t) => {
                if let Some((depth, _, fields)) = open.last_mut() {
                    if stack.len() == *depth + 1 {
                        let text = t.unescape().map_err(xml_error)?;
                        fields.append(&stack[stack.len() - 1], &text);
                    }
                }
            }
            Event::End(_) => {
                if open.last().is_some_and(|(depth, _, _)| *depth == stack.len()) {
                    if let Some((_, order, fields)) = open.pop() {
                        finished.push((order, fields));
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FetchError::format("依赖列表响应为空"));
    }

    finished.sort_by_key(|(order, _)| *order);

    let mut children = FolderChildren::default();
    for (_, fields) in finished {
        let id = fields.id.trim().to_string();
        let name = fields.name.trim().to_string();
        match fields.kind.parse::<DependencyKind>() {
            Ok(DependencyKind::Service) => children.services.push(ServiceRef { id, name }),
            Ok(DependencyKind::Folder) => children.subfolders.push(FolderRef { id, name }),
            _ => {}
        }
    }
    Ok(children)
}

/// 从 `GET /restman/1.0/services/{id}` 中提取 URL 模式
///
/// 依次尝试：
/// 1. `ServiceDetail/ServiceMappings/HttpMapping/UrlPattern`
/// 2. `type="service"` 的 `Resource` 文本内嵌 XML 中的 `urlPattern`
///
/// 都找不到时返回 [`ResolutionPath::NotFound`]；只有外层文档本身无法解析才返回错误。
pub fn parse_resolution_path(xml: &str) -> Result<ResolutionPath, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut mapped: Option<String> = None;
    let mut resource: Option<(usize, String)> = None;
    let mut resources: Vec<String> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                saw_root = true;
                let name = local_name(e.local_name().as_ref());
                let is_service_resource = name == "Resource" && has_type_service(&e)?;
                stack.push(name);
                if is_service_resource && resource.is_none() {
                    resource = Some((stack.len(), String::new()));
                }
            }
            Event::Empty(_) => saw_root = true,
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                on_text(&stack, &text, &mut mapped, &mut resource);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                on_text(&stack, &text, &mut mapped, &mut resource);
            }
            Event::End(_) => {
                if resource.as_ref().is_some_and(|(depth, _)| *depth == stack.len()) {
                    if let Some((_, content)) = resource.take() {
                        resources.push(content);
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FetchError::format("服务详情响应为空"));
    }

    if let Some(pattern) = mapped {
        return Ok(ResolutionPath::Found(pattern));
    }

    Ok(resources
        .iter()
        .filter(|content| content.contains("urlPattern"))
        .find_map(|content| inner_url_pattern(content))
        .map(ResolutionPath::Found)
        .unwrap_or(ResolutionPath::NotFound))
}

fn has_type_service(e: &quick_xml::events::BytesStart<'_>) -> Result<bool, FetchError> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.local_name().as_ref() == b"type" {
            let value = attr.unescape_value().map_err(xml_error)?;
            return Ok(value == "service");
        }
    }
    Ok(false)
}

fn on_text(
    stack: &[String],
    text: &str,
    mapped: &mut Option<String>,
    resource: &mut Option<(usize, String)>,
) {
    if mapped.is_none() && is_mapped_url_pattern(stack) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            *mapped = Some(trimmed.to_string());
        }
    }
    if let Some((depth, content)) = resource.as_mut() {
        if stack.len() == *depth {
            content.push_str(text);
        }
    }
}

fn is_mapped_url_pattern(stack: &[String]) -> bool {
    let n = stack.len();
    if n < 2 || stack[n - 1] != "UrlPattern" || stack[n - 2] != "HttpMapping" {
        return false;
    }
    let ancestors = &stack[..n - 2];
    match (
        ancestors.iter().position(|s| s == "ServiceDetail"),
        ancestors.iter().rposition(|s| s == "ServiceMappings"),
    ) {
        (Some(detail), Some(mappings)) => detail < mappings,
        _ => false,
    }
}

/// 内嵌文档中第一个非空 `urlPattern`；内嵌文档损坏时视为没有
fn inner_url_pattern(content: &str) -> Option<String> {
    let mut reader = Reader::from_str(content);
    let mut in_pattern = false;
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => in_pattern = e.local_name().as_ref() == b"urlPattern",
            Event::Text(t) if in_pattern => {
                let text = t.unescape().ok()?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            Event::End(_) => in_pattern = false,
            Event::Eof => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOLDERS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<l7:List xmlns:l7="http://ns.l7tech.com/2010/04/gateway-management">
    <l7:Name>FOLDER List</l7:Name>
    <l7:Type>List</l7:Type>
    <l7:Item>
        <l7:Name>BHDL</l7:Name>
        <l7:Id>f-bhdl</l7:Id>
        <l7:Type>FOLDER</l7:Type>
    </l7:Item>
    <l7:Item>
        <l7:Name>BHDIB &amp; Co</l7:Name>
        <l7:Id>f-bhdib</l7:Id>
        <l7:Type>FOLDER</l7:Type>
    </l7:Item>
</l7:List>"#;

    const DEPENDENCIES: &str = r#"<l7:Item xmlns:l7="http://ns.l7tech.com/2010/04/gateway-management">
    <l7:Name>BHDL</l7:Name>
    <l7:Type>DEPENDENCY</l7:Type>
    <l7:Resource>
        <l7:DependencyList>
            <l7:Reference>
                <l7:Name>BHDL</l7:Name>
                <l7:Id>f-bhdl</l7:Id>
                <l7:Type>FOLDER</l7:Type>
            </l7:Reference>
            <l7:Dependencies>
                <l7:Dependency>
                    <l7:Name>Svc1</l7:Name>
                    <l7:Id>s1</l7:Id>
                    <l7:Type>SERVICE</l7:Type>
                    <l7:Dependencies>
                        <l7:Dependency>
                            <l7:Name>shared-policy</l7:Name>
                            <l7:Id>p1</l7:Id>
                            <l7:Type>POLICY</l7:Type>
                        </l7:Dependency>
                    </l7:Dependencies>
                </l7:Dependency>
                <l7:Dependency>
                    <l7:Name>X</l7:Name>
                    <l7:Id>f-x</l7:Id>
                    <l7:Type>FOLDER</l7:Type>
                </l7:Dependency>
                <l7:Dependency>
                    <l7:Name>Y</l7:Name>
                    <l7:Id>f-y</l7:Id>
                    <l7:Type>FOLDER</l7:Type>
                </l7:Dependency>
            </l7:Dependencies>
        </l7:DependencyList>
    </l7:Resource>
</l7:Item>"#;

    #[test]
    fn test_parse_folder_list() {
        let folders = parse_folder_list(FOLDERS).unwrap();
        assert_eq!(
            folders,
            vec![
                FolderRef::new("f-bhdl", "BHDL"),
                FolderRef::new("f-bhdib", "BHDIB & Co"),
            ]
        );
    }

    #[test]
    fn test_parse_dependencies_splits_by_type() {
        let children = parse_dependencies(DEPENDENCIES).unwrap();
        assert_eq!(children.services, vec![ServiceRef::new("s1", "Svc1")]);
        assert_eq!(
            children.subfolders,
            vec![FolderRef::new("f-x", "X"), FolderRef::new("f-y", "Y")]
        );
    }

    #[test]
    fn test_parse_dependencies_keeps_document_order_for_nested() {
        let xml = r#"<l7:Item xmlns:l7="urn:x"><l7:Dependencies>
            <l7:Dependency><l7:Name>A</l7:Name><l7:Id>a</l7:Id><l7:Type>SERVICE</l7:Type>
                <l7:Dependencies>
                    <l7:Dependency><l7:Name>B</l7:Name><l7:Id>b</l7:Id><l7:Type>SERVICE</l7:Type></l7:Dependency>
                </l7:Dependencies>
            </l7:Dependency>
            <l7:Dependency><l7:Name>C</l7:Name><l7:Id>c</l7:Id><l7:Type>SERVICE</l7:Type></l7:Dependency>
        </l7:Dependencies></l7:Item>"#;
        let children = parse_dependencies(xml).unwrap();
        let ids: Vec<_> = children.services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_dependencies_empty_folder() {
        let xml = r#"<l7:Item xmlns:l7="urn:x"><l7:Resource><l7:DependencyList/></l7:Resource></l7:Item>"#;
        let children = parse_dependencies(xml).unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_format_error() {
        assert!(matches!(
            parse_dependencies("<l7:Item><l7:Name>x</l7:Item>"),
            Err(FetchError::Format(_))
        ));
        assert!(matches!(parse_folder_list(""), Err(FetchError::Format(_))));
    }

    #[test]
    fn test_resolution_path_from_http_mapping() {
        let xml = r#"<l7:Item xmlns:l7="urn:x"><l7:Resource><l7:Service id="s1">
            <l7:ServiceDetail id="s1">
                <l7:Name>Svc1</l7:Name>
                <l7:ServiceMappings>
                    <l7:HttpMapping>
                        <l7:UrlPattern>/bhdl/svc1/*</l7:UrlPattern>
                        <l7:Verbs><l7:Verb>GET</l7:Verb></l7:Verbs>
                    </l7:HttpMapping>
                </l7:ServiceMappings>
            </l7:ServiceDetail>
        </l7:Service></l7:Resource></l7:Item>"#;
        assert_eq!(
            parse_resolution_path(xml).unwrap(),
            ResolutionPath::Found("/bhdl/svc1/*".to_string())
        );
    }

    #[test]
    fn test_resolution_path_from_embedded_resource() {
        let xml = r#"<l7:Item xmlns:l7="urn:x"><l7:Resources>
            <l7:Resource type="policy">&lt;urlPattern&gt;/wrong&lt;/urlPattern&gt;</l7:Resource>
            <l7:Resource type="service">&lt;service&gt;&lt;urlPattern&gt;/embedded/*&lt;/urlPattern&gt;&lt;/service&gt;</l7:Resource>
        </l7:Resources></l7:Item>"#;
        assert_eq!(
            parse_resolution_path(xml).unwrap(),
            ResolutionPath::Found("/embedded/*".to_string())
        );
    }

    #[test]
    fn test_resolution_path_not_found() {
        let xml = r#"<l7:Item xmlns:l7="urn:x"><l7:ServiceDetail><l7:Name>Svc</l7:Name></l7:ServiceDetail></l7:Item>"#;
        assert_eq!(parse_resolution_path(xml).unwrap(), ResolutionPath::NotFound);
    }

    #[test]
    fn test_url_pattern_outside_service_detail_ignored() {
        let xml = r#"<l7:Item xmlns:l7="urn:x"><l7:HttpMapping><l7:UrlPattern>/loose</l7:UrlPattern></l7:HttpMapping></l7:Item>"#;
        assert_eq!(parse_resolution_path(xml).unwrap(), ResolutionPath::NotFound);
    }
}
