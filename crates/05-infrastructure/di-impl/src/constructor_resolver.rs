//! 构造器与工厂方法解析
//!
//! 候选构造器按参数数量从多到少尝试，第一个全部参数都能满足的构造器胜出。
//! 同样参数数量时按声明顺序取第一个；两个签名完全相同且都能满足的构造器
//! 视为歧义，直接报错。

use crate::factory::DefaultBeanFactory;
use crate::value_resolver::ValueResolver;
use di_abstractions::{
    Args, AutowireMode, BeanDefinition, BeanFactory, BeanInstance, ComponentModel, CreationContext,
    DefinitionRegistry, DependencyDescriptor, DynValue, ParameterInfo,
};
use infrastructure_common::{BeanError, BeanResult, CreationPhase, TypeInfo};
use std::sync::Arc;
use tracing::{debug, trace};

/// 已解析的构造器或工厂方法参数，按 Bean 名称缓存
#[derive(Debug, Clone)]
pub struct ResolvedArguments {
    /// 构造器下标；工厂方法时为 `None`
    pub constructor: Option<usize>,
    /// 每个参数解析到的 Bean 名称，用于下次快捷解析
    pub shortcuts: Vec<Option<String>>,
}

/// 一个待调用的构造器或方法
struct Executable<'p> {
    declaring: &'p TypeInfo,
    name: String,
    params: &'p [ParameterInfo],
}

pub(crate) struct ConstructorResolver<'a> {
    factory: &'a DefaultBeanFactory,
}

impl<'a> ConstructorResolver<'a> {
    pub(crate) fn new(factory: &'a DefaultBeanFactory) -> Self {
        Self { factory }
    }

    /// 构造器自动装配
    pub(crate) fn autowire_constructor(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        model: &Arc<dyn ComponentModel>,
        candidates: Option<Vec<usize>>,
        explicit_args: Option<Args>,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        let constructors = model.constructors();
        let autowiring = candidates.is_some()
            || definition.autowire_mode == AutowireMode::Constructor;
        let mut indices = candidates.unwrap_or_else(|| (0..constructors.len()).collect());
        indices.retain(|index| *index < constructors.len());
        if indices.is_empty() {
            return Err(BeanError::creation(
                bean_name,
                CreationPhase::Instantiation,
                format!("类型 {} 没有可用的构造器", model.type_info()),
            ));
        }
        indices.sort_by_key(|index| std::cmp::Reverse(constructors[*index].param_count()));

        let min_args = match &explicit_args {
            Some(args) => args.len(),
            None => definition
                .constructor_args
                .keys()
                .next_back()
                .map_or(0, |last| last + 1),
        };

        let mut chosen: Option<(usize, Args, Vec<Option<String>>)> = None;
        let mut ambiguous: Vec<usize> = Vec::new();
        let mut causes: Vec<BeanError> = Vec::new();

        for index in indices {
            let constructor = &constructors[index];
            let count = constructor.param_count();
            if let Some((chosen_index, _, _)) = &chosen {
                if constructors[*chosen_index].param_count() > count {
                    break;
                }
            }
            if count < min_args {
                continue;
            }
            if explicit_args.as_ref().map_or(false, |args| args.len() != count) {
                continue;
            }

            let executable = Executable {
                declaring: model.type_info(),
                name: format!("构造器#{}", index),
                params: &constructor.params,
            };
            let resolved = self.resolve_arguments(
                bean_name,
                definition,
                &executable,
                explicit_args.as_ref(),
                None,
                autowiring,
                ctx,
            );
            let (args, shortcuts) = match resolved {
                Ok(resolved) => resolved,
                Err(err) => {
                    trace!("Bean '{}' 的{}无法满足: {}", bean_name, executable.name, err);
                    causes.push(err);
                    continue;
                }
            };

            let same_signature = chosen
                .as_ref()
                .map(|(chosen_index, _, _)| constructors[*chosen_index].signature() == constructor.signature());
            match same_signature {
                None => chosen = Some((index, args, shortcuts)),
                Some(true) => ambiguous.push(index),
                Some(false) => {}
            }
        }

        let Some((index, args, shortcuts)) = chosen else {
            let Some(last) = causes.pop() else {
                return Err(BeanError::creation(
                    bean_name,
                    CreationPhase::Instantiation,
                    format!("类型 {} 没有参数数量匹配的构造器", model.type_info()),
                ));
            };
            for cause in causes {
                self.factory.registry().on_suppressed_error(cause);
            }
            return Err(last);
        };
        for cause in causes {
            self.factory.registry().on_suppressed_error(cause);
        }

        if !ambiguous.is_empty() {
            ambiguous.insert(0, index);
            return Err(BeanError::creation(
                bean_name,
                CreationPhase::Instantiation,
                format!("构造器 {:?} 的签名相同且都能满足，无法确定使用哪一个", ambiguous),
            ));
        }

        debug!(
            "Bean '{}' 使用{}个参数的构造器#{}",
            bean_name,
            constructors[index].param_count(),
            index
        );
        if explicit_args.is_none() {
            self.factory.cache_resolved_arguments(
                bean_name,
                ResolvedArguments {
                    constructor: Some(index),
                    shortcuts,
                },
            );
        }
        self.instantiate(bean_name, model, index, args)
    }

    /// 使用缓存的构造器与参数快捷方式创建实例
    pub(crate) fn instantiate_resolved(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        model: &Arc<dyn ComponentModel>,
        resolved: &ResolvedArguments,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        let Some(index) = resolved.constructor else {
            return self.instantiate_using_factory_method(bean_name, definition, None, ctx);
        };
        let constructor = model.constructors().get(index).ok_or_else(|| {
            BeanError::creation(
                bean_name,
                CreationPhase::Instantiation,
                format!("缓存的构造器#{} 已不存在", index),
            )
        })?;
        let executable = Executable {
            declaring: model.type_info(),
            name: format!("构造器#{}", index),
            params: &constructor.params,
        };
        let (args, _) = self.resolve_arguments(
            bean_name,
            definition,
            &executable,
            None,
            Some(&resolved.shortcuts),
            true,
            ctx,
        )?;
        self.instantiate(bean_name, model, index, args)
    }

    fn instantiate(
        &self,
        bean_name: &str,
        model: &Arc<dyn ComponentModel>,
        index: usize,
        args: Args,
    ) -> BeanResult<BeanInstance> {
        let object = model.instantiate(index, args).map_err(|err| {
            BeanError::creation_caused_by(
                bean_name,
                CreationPhase::Instantiation,
                format!("调用 {} 的构造器#{} 失败", model.type_info(), index),
                err,
            )
        })?;
        Ok(BeanInstance::new(object, model.clone()))
    }

    /// 通过工厂方法创建实例
    ///
    /// 指定了工厂 Bean 时调用它的实例方法，否则调用组件模型上的静态方法。
    pub(crate) fn instantiate_using_factory_method(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        explicit_args: Option<Args>,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        let method_name = definition.factory_method_name.as_deref().ok_or_else(|| {
            BeanError::creation(bean_name, CreationPhase::Instantiation, "定义没有工厂方法")
        })?;
        let cached = if explicit_args.is_none() {
            self.factory.resolved_arguments(bean_name)
        } else {
            None
        };
        let shortcuts = cached.as_ref().map(|resolved| resolved.shortcuts.as_slice());

        let (result, shortcuts) = match &definition.factory_bean_name {
            Some(factory_bean_name) => {
                if self.factory.canonical_name(factory_bean_name) == bean_name {
                    return Err(BeanError::creation(
                        bean_name,
                        CreationPhase::Instantiation,
                        "工厂 Bean 不能是自身",
                    ));
                }
                let factory_bean = self.factory.get_bean_in(factory_bean_name, ctx)?;
                self.factory.register_dependent_bean(factory_bean_name, bean_name);

                let model = factory_bean.model().clone();
                let method = model.method(method_name).ok_or_else(|| {
                    BeanError::creation(
                        bean_name,
                        CreationPhase::Instantiation,
                        format!("工厂 Bean '{}' 没有方法 '{}'", factory_bean_name, method_name),
                    )
                })?;
                let executable = Executable {
                    declaring: model.type_info(),
                    name: method_name.to_string(),
                    params: &method.params,
                };
                let (args, shortcuts) = self.resolve_arguments(
                    bean_name,
                    definition,
                    &executable,
                    explicit_args.as_ref(),
                    shortcuts,
                    true,
                    ctx,
                )?;
                let value = factory_bean.invoke(method_name, args).map_err(|err| {
                    BeanError::creation_caused_by(
                        bean_name,
                        CreationPhase::Instantiation,
                        format!("工厂方法 '{}.{}' 调用失败", factory_bean_name, method_name),
                        err,
                    )
                })?;
                (self.product_instance(bean_name, definition, value)?, shortcuts)
            }
            None => {
                let model = definition.class.clone().ok_or_else(|| {
                    BeanError::creation(
                        bean_name,
                        CreationPhase::Instantiation,
                        "静态工厂方法需要组件模型",
                    )
                })?;
                let method = model
                    .static_methods()
                    .iter()
                    .find(|method| method.name == method_name)
                    .ok_or_else(|| {
                        BeanError::creation(
                            bean_name,
                            CreationPhase::Instantiation,
                            format!("类型 {} 没有静态方法 '{}'", model.type_info(), method_name),
                        )
                    })?;
                let executable = Executable {
                    declaring: model.type_info(),
                    name: method_name.to_string(),
                    params: &method.params,
                };
                let (args, shortcuts) = self.resolve_arguments(
                    bean_name,
                    definition,
                    &executable,
                    explicit_args.as_ref(),
                    shortcuts,
                    true,
                    ctx,
                )?;
                let object = model.invoke_static(method_name, args).map_err(|err| {
                    BeanError::creation_caused_by(
                        bean_name,
                        CreationPhase::Instantiation,
                        format!("静态工厂方法 '{}::{}' 调用失败", model.type_info(), method_name),
                        err,
                    )
                })?;
                (BeanInstance::new(object, model), shortcuts)
            }
        };

        if explicit_args.is_none() && cached.is_none() {
            self.factory.cache_resolved_arguments(
                bean_name,
                ResolvedArguments {
                    constructor: None,
                    shortcuts,
                },
            );
        }
        Ok(result)
    }

    fn product_instance(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        value: DynValue,
    ) -> BeanResult<BeanInstance> {
        match value {
            DynValue::Bean(bean) => Ok(bean),
            DynValue::Object(object) => {
                let model = definition.class.clone().ok_or_else(|| {
                    BeanError::creation(
                        bean_name,
                        CreationPhase::Instantiation,
                        "工厂方法返回了未包装的对象，定义中需要声明组件模型",
                    )
                })?;
                Ok(BeanInstance::new(object, model))
            }
            other => Err(BeanError::creation(
                bean_name,
                CreationPhase::Instantiation,
                format!("工厂方法返回的值不能作为 Bean: {:?}", other),
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_arguments(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        executable: &Executable<'_>,
        explicit_args: Option<&Args>,
        shortcuts: Option<&[Option<String>]>,
        autowiring: bool,
        ctx: &mut CreationContext,
    ) -> BeanResult<(Args, Vec<Option<String>>)> {
        let mut args = Args::empty();
        let mut resolved_shortcuts = Vec::with_capacity(executable.params.len());

        for (index, param) in executable.params.iter().enumerate() {
            if let Some(explicit) = explicit_args {
                args.push(explicit.get(index).cloned().unwrap_or(DynValue::Null));
                resolved_shortcuts.push(None);
                continue;
            }

            if let Some(configured) = definition.constructor_args.get(&index) {
                let context = format!("{}的第 {} 个参数", executable.name, index);
                let value = ValueResolver::new(self.factory, bean_name, definition, CreationPhase::Instantiation)
                    .resolve(&context, configured, ctx)?;
                args.push(value);
                resolved_shortcuts.push(None);
                continue;
            }

            let mut descriptor =
                DependencyDescriptor::for_parameter(executable.declaring, &executable.name, index, param);
            if !autowiring {
                return Err(BeanError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.describe(),
                    source: Box::new(BeanError::no_such_bean_of_type(
                        param.type_key.name(),
                        "参数没有配置值，且未启用构造器自动装配",
                    )),
                });
            }
            if let Some(Some(shortcut)) = shortcuts.and_then(|cached| cached.get(index)) {
                descriptor = descriptor.with_shortcut(shortcut.clone());
            }

            let resolved = self
                .factory
                .resolve_dependency(&descriptor, Some(bean_name), ctx)
                .map_err(|err| BeanError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.describe(),
                    source: Box::new(err),
                })?;
            let shortcut = match resolved.bean_names.as_slice() {
                [single] if !param.multiple => Some(single.clone()),
                _ => None,
            };
            args.push(resolved.value);
            resolved_shortcuts.push(shortcut);
        }
        Ok((args, resolved_shortcuts))
    }
}
