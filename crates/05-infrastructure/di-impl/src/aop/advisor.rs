//! 通知器与切点

use di_abstractions::{Advice, Advisor, AnyClass, ClassFilter, ComponentModel, MethodInfo, MethodMatcher, Pointcut};
use infrastructure_common::LOWEST_PRECEDENCE;
use std::sync::Arc;

/// 通知加可选切点
pub struct DefaultPointcutAdvisor {
    advice: Advice,
    pointcut: Option<Arc<dyn Pointcut>>,
    order: i32,
}

impl DefaultPointcutAdvisor {
    /// 作用于全部方法的通知器
    pub fn new(advice: Advice) -> Self {
        Self {
            advice,
            pointcut: None,
            order: LOWEST_PRECEDENCE,
        }
    }

    /// 限定切点
    pub fn with_pointcut(mut self, pointcut: Arc<dyn Pointcut>) -> Self {
        self.pointcut = Some(pointcut);
        self
    }

    /// 设置顺序
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Advisor for DefaultPointcutAdvisor {
    fn advice(&self) -> Advice {
        self.advice.clone()
    }

    fn pointcut(&self) -> Option<&dyn Pointcut> {
        self.pointcut.as_deref()
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// 简单通配符匹配，`*` 匹配任意长度
pub fn simple_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(star) = star {
            p = star + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

/// 按方法名称匹配的切点
pub struct NameMatchMethodPointcut {
    names: Vec<String>,
}

impl NameMatchMethodPointcut {
    /// 名称支持 `*` 通配符
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl MethodMatcher for NameMatchMethodPointcut {
    fn matches(&self, method: &MethodInfo, _model: &dyn ComponentModel) -> bool {
        self.names.iter().any(|name| simple_match(name, &method.name))
    }
}

impl Pointcut for NameMatchMethodPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &AnyClass
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}

/// 按注解匹配的切点：方法上有注解，或在允许时类上有注解
pub struct AnnotationMethodPointcut {
    annotation: String,
    check_class: bool,
}

impl AnnotationMethodPointcut {
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            check_class: false,
        }
    }

    /// 同时接受类级注解
    pub fn with_class_annotation(mut self) -> Self {
        self.check_class = true;
        self
    }
}

impl MethodMatcher for AnnotationMethodPointcut {
    fn matches(&self, method: &MethodInfo, model: &dyn ComponentModel) -> bool {
        method.annotations.has(&self.annotation)
            || (self.check_class && model.annotations().has(&self.annotation))
    }
}

impl Pointcut for AnnotationMethodPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &AnyClass
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}
